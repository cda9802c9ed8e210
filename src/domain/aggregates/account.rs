//! Account Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use crate::domain::value_objects::AccountId;
use super::order::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { Farmer, Consumer, Admin }

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Farmer => "farmer", Self::Consumer => "consumer", Self::Admin => "admin" }
    }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "farmer" => Ok(Self::Farmer), "consumer" => Ok(Self::Consumer), "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Registered user. Credentials live with the external identity provider.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub(crate) id: AccountId,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) phone: Option<String>,
    pub(crate) role: Role,
    pub(crate) address: Option<Address>,
    pub(crate) farm_name: Option<String>,
    pub(crate) farm_location: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl Account {
    pub fn register(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: AccountId::new(), name: name.into(), email: email.into(), phone: None, role,
            address: None, farm_name: None, farm_location: None, created_at: Utc::now(),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self { self.address = Some(address); self }
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self { self.phone = Some(phone.into()); self }
    pub fn with_farm(mut self, farm_name: impl Into<String>, farm_location: impl Into<String>) -> Self {
        self.farm_name = Some(farm_name.into());
        self.farm_location = Some(farm_location.into());
        self
    }

    pub fn id(&self) -> AccountId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn email(&self) -> &str { &self.email }
    pub fn phone(&self) -> Option<&str> { self.phone.as_deref() }
    pub fn role(&self) -> Role { self.role }
    pub fn address(&self) -> Option<&Address> { self.address.as_ref() }
    pub fn farm_name(&self) -> Option<&str> { self.farm_name.as_deref() }
    pub fn farm_location(&self) -> Option<&str> { self.farm_location.as_deref() }

    /// Overwrites the fields present in `update`; email and role never change here.
    pub fn apply_profile(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.name { self.name = name.trim().to_string(); }
        if let Some(phone) = &update.phone { self.phone = Some(phone.trim().to_string()).filter(|p| !p.is_empty()); }
        if let Some(farm_name) = &update.farm_name { self.farm_name = Some(farm_name.trim().to_string()).filter(|f| !f.is_empty()); }
        if let Some(location) = &update.farm_location { self.farm_location = Some(location.trim().to_string()).filter(|l| !l.is_empty()); }
        if let Some(address) = &update.address { self.address = Some(address.clone()); }
    }
}

/// Partial edit of an account's contact and farm details. `None` leaves a field as it is;
/// a blank string clears an optional field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub address: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_touches_only_given_fields() {
        let mut farmer = Account::register("Ravi", "ravi@farm.test", Role::Farmer).with_phone("123").with_farm("Green Acres", "Mysuru");
        farmer.apply_profile(&ProfileUpdate { name: Some("  Ravi Kumar ".into()), phone: Some(" ".into()), ..Default::default() });
        assert_eq!(farmer.name(), "Ravi Kumar");
        assert_eq!(farmer.phone(), None);
        assert_eq!(farmer.farm_name(), Some("Green Acres"));
        assert_eq!(farmer.email(), "ravi@farm.test");
        assert_eq!(farmer.role(), Role::Farmer);
    }
}
