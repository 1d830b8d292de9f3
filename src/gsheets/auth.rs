//! Credential check against the users sheet
//!
//! Credentials are compared client-side against a plain read of the users
//! layout. The read is bounded by a deadline so a hanging endpoint cannot
//! block sign-in forever.

use super::client::SheetsClient;
use super::error::{FieldError, Result, SheetError};
use super::layouts::SheetLayout;
use super::session::UserRecord;
use std::time::Duration;
use tracing::{info, warn};

/// Default deadline for the users-sheet read
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Look up `username`/`password` in the users sheet
///
/// The username match is trimmed and case-insensitive; the password must
/// match exactly. A mismatch is a validation error on `password` so it can
/// be shown inline. Blank input fails without a network call.
pub async fn authenticate(
    client: &SheetsClient,
    layout: &SheetLayout,
    username: &str,
    password: &str,
    deadline: Duration,
) -> Result<UserRecord> {
    let mut missing = Vec::new();
    if username.trim().is_empty() {
        missing.push(FieldError::new("username", "is required"));
    }
    if password.is_empty() {
        missing.push(FieldError::new("password", "is required"));
    }
    if !missing.is_empty() {
        return Err(SheetError::Validation(missing));
    }

    let columns = &layout.columns;
    let user_col = columns.index_of("username")?;
    let pass_col = columns.index_of("password")?;
    let name_col = columns.get("name").map(|f| f.index);
    let role_col = columns.get("role").map(|f| f.index);

    let data = client
        .reader()
        .read_with_deadline(&layout.sheet_ref()?, &layout.read_options()?, deadline)
        .await?;

    let wanted = username.trim().to_lowercase();
    let matched = data
        .rows
        .iter()
        .find(|row| row.get(user_col).trim().to_lowercase() == wanted && row.get(pass_col) == password);

    match matched {
        Some(row) => {
            let user = UserRecord {
                username: row.get(user_col).trim().to_string(),
                name: name_col.map(|i| row.get(i).trim().to_string()).unwrap_or_default(),
                role: role_col.map(|i| row.get(i).trim().to_string()).unwrap_or_default(),
            };
            info!(user = %user.username, role = %user.role, "signed in");
            Ok(user)
        }
        None => {
            warn!(user = %username.trim(), "sign-in rejected");
            Err(SheetError::Validation(vec![FieldError::new(
                "password",
                "Invalid username or password",
            )]))
        }
    }
}
