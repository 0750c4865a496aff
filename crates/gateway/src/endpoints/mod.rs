//! # APIエンドポイント
//!
//! - `GET /address` — リレーのアドレス
//! - `POST /sign` — 署名の記録
//! - `POST /invalidate` — 署名の無効化

mod address;
mod sign;

pub use address::handle_address;
pub use sign::{handle_invalidate, handle_sign, operation_response};
