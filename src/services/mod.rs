/*
 * Responsibility
 * - Process-level services injected into AppState
 * - cache: backend-agnostic cache client (Valkey)
 * - token_store: TokenIssuer implementations
 */
pub mod cache;
pub mod token_store;
