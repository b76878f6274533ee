/*
 * Responsibility
 * - TokenIssuer implementations (OAuth2 authorized-client stores)
 * - Writes come from the external login flow; the gateway only reads
 */
pub mod cached;
pub mod memory;

pub use cached::CacheClientStore;
pub use memory::InMemoryClientStore;
