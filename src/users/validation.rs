use super::dto::UserFields;
use super::repo::{StoreError, UserStore};
use super::repo_types::ValidationErrors;

pub const NAME_MIN: usize = 2;
pub const USERNAME_MIN: usize = 4;
pub const USERNAME_MAX: usize = 25;

pub const BLANK: &str = "can't be blank";
pub const TAKEN: &str = "has already been taken";

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn too_short(min: usize) -> String {
    format!("is too short (minimum is {min} characters)")
}

fn too_long(max: usize) -> String {
    format!("is too long (maximum is {max} characters)")
}

/// Presence and length rules; needs no store access.
pub fn check_fields(fields: &UserFields) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if is_blank(&fields.name) {
        errors.add("name", BLANK);
    }
    if fields.name.chars().count() < NAME_MIN {
        errors.add("name", too_short(NAME_MIN));
    }

    if is_blank(&fields.username) {
        errors.add("username", BLANK);
    }
    let username_len = fields.username.chars().count();
    if username_len < USERNAME_MIN {
        errors.add("username", too_short(USERNAME_MIN));
    } else if username_len > USERNAME_MAX {
        errors.add("username", too_long(USERNAME_MAX));
    }

    if is_blank(&fields.email) {
        errors.add("email", BLANK);
    }
    if is_blank(&fields.phone) {
        errors.add("phone", BLANK);
    }

    errors
}

/// Every rule, including username/email uniqueness against records other
/// than `own_id`.
pub async fn validate(
    store: &dyn UserStore,
    own_id: Option<i64>,
    fields: &UserFields,
) -> Result<ValidationErrors, StoreError> {
    let mut errors = check_fields(fields);
    let taken_by_other = |found: Option<i64>| matches!(found, Some(id) if Some(id) != own_id);

    if !is_blank(&fields.username) {
        let found = store.find_by_username(&fields.username).await?;
        if taken_by_other(found.map(|u| u.id)) {
            errors.add("username", TAKEN);
        }
    }
    if !is_blank(&fields.email) {
        let found = store.find_by_email(&fields.email).await?;
        if taken_by_other(found.map(|u| u.id)) {
            errors.add("email", TAKEN);
        }
    }

    Ok(errors)
}
