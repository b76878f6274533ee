/*
 * Responsibility
 * - 予約パス (/actuator, /fallback, /error) と proxy catch-all の公開ポイント
 */
pub mod handlers;
mod routes;

pub use routes::routes;
