mod mfa;
mod password;
mod session;
mod session_helpers;

pub use mfa::{
    mfa_confirm_handler, mfa_disable_handler, mfa_enroll_handler,
    mfa_regenerate_recovery_codes_handler,
};
pub use password::{
    change_password_handler, forgot_password_handler, login_handler, mfa_login_handler,
    refresh_handler, register_handler, reset_password_handler,
};
pub use session::{
    get_session_handler, list_sessions_handler, logout_handler, me_handler,
    terminate_session_handler,
};
