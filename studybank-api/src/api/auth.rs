//! Researcher authentication
//!
//! Researcher-facing endpoints carry a `password` form field compared to the
//! configured admin password. Participant-facing endpoints are deliberately
//! unauthenticated: possession of a study code is the capability.

use studybank_common::Error;

use crate::api::ApiError;
use crate::AppState;

/// Check the researcher password supplied with a request
pub fn require_admin(state: &AppState, password: &str) -> Result<(), ApiError> {
    if password != state.settings.admin_password {
        return Err(Error::Unauthorized("Wrong admin password".to_string()).into());
    }
    Ok(())
}
