/*
 * Responsibility
 * - middleware の公開インターフェース
 * - http: request id / body limit
 * - principal: 外部認証層が付けた identity を Principal として extensions へ
 */
pub mod http;
pub mod principal;
