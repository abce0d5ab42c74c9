/// Router Module Index
///
/// Routes are split by access level so the authentication layer is applied
/// per module rather than per handler.

/// Read-only routes open to anonymous clients.
pub mod public;

/// Write routes behind the `AuthUser` middleware.
pub mod authenticated;
