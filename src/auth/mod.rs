pub mod guard;
pub mod middleware;
pub mod password;
pub mod service;
pub mod session;

// Re-export necessary items
pub use guard::CurrentUser;
pub use middleware::SessionHydration;
pub use password::{hash_password, verify_password};
pub use service::{AuthService, Hydration};
pub use session::{clear_cookie, issue_cookie, MemorySessionStore, SessionStore, SESSION_COOKIE};
