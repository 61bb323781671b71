use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{impl_entity, state_ref, EntityData};
use crate::{
    base::ResourceID,
    error::resource::{ValidationErrorKind, ValidationFieldError},
};

/// Credits granted to every account on sign up.
pub const INITIAL_CREDITS: i32 = 50;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subscription {
    Free,
    Premium,
    Ultra,
}

impl Subscription {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subscription::Free => "Free",
            Subscription::Premium => "Premium",
            Subscription::Ultra => "Ultra",
        }
    }

    /// Credits added on each paid period of the plan.
    pub fn period_credits(&self) -> i32 {
        match self {
            Subscription::Free => 0,
            Subscription::Premium => 25,
            Subscription::Ultra => 50,
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::Free
    }
}

impl ResourceID for Subscription {
    fn resource_id() -> &'static str {
        "iam::subscription"
    }
}

impl FromStr for Subscription {
    type Err = ValidationFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Free" | "free" => Ok(Self::Free),
            "Premium" | "premium" => Ok(Self::Premium),
            "Ultra" | "ultra" => Ok(Self::Ultra),
            _ => Err(ValidationFieldError::new(
                Self::resource_id(),
                s.into(),
                "/subscription".into(),
                vec![ValidationErrorKind::UnknownVariant(vec![
                    "Free".into(),
                    "Premium".into(),
                    "Ultra".into(),
                ])],
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserState {
    pub(in crate::domain) email: String,
    pub(in crate::domain) google_id: String,
    pub(in crate::domain) name: Option<String>,
    pub(in crate::domain) picture: Option<String>,
    pub(in crate::domain) credits: i32,
    pub(in crate::domain) subscription: Subscription,
}

#[derive(Debug, Clone)]
pub struct User {
    pub(in crate::domain) data: EntityData,
    pub(in crate::domain) state: UserState,
}

impl_entity!(User, UserState);

impl User {
    state_ref!(email, String);
    state_ref!(google_id, String);
    state_ref!(name, Option<String>);
    state_ref!(picture, Option<String>);

    pub fn credits(&self) -> i32 {
        self.state.credits
    }

    pub fn subscription(&self) -> Subscription {
        self.state.subscription
    }

    pub fn new(
        email: String,
        google_id: String,
        name: Option<String>,
        picture: Option<String>,
    ) -> Self {
        Self::restore(
            EntityData::new(),
            UserState {
                email,
                google_id,
                name,
                picture,
                credits: INITIAL_CREDITS,
                subscription: Subscription::Free,
            },
        )
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::domain::entity::Entity;

    #[test]
    fn new_user_starts_free_with_initial_credits() {
        let user = User::new("a@b.com".into(), "sub-1".into(), None, None);

        assert_eq!(user.credits(), INITIAL_CREDITS);
        assert_eq!(user.subscription(), Subscription::Free);
        assert_eq!(user.version(), 1);
        assert!(user.updated().is_none());
    }

    #[test]
    fn paid_plans_credit_each_period() {
        assert_eq!(Subscription::Free.period_credits(), 0);
        assert_eq!(Subscription::Premium.period_credits(), 25);
        assert_eq!(Subscription::Ultra.period_credits(), 50);
    }

    #[test]
    fn parse_subscription() {
        assert_eq!("Premium".parse::<Subscription>(), Ok(Subscription::Premium));
        assert_eq!("ultra".parse::<Subscription>(), Ok(Subscription::Ultra));
        assert!("Gold".parse::<Subscription>().is_err());
    }
}
