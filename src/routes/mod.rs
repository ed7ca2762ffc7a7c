/// Router Module Index
///
/// Splits the router by who guards it: `public` is never gated, while `knowledge`
/// and `moderation` sit behind the login guard layered on in `create_router`.

/// Unguarded operational endpoints.
pub mod public;

/// Index, listing, thread and ask pages.
pub mod knowledge;

/// The single moderation endpoint.
pub mod moderation;
