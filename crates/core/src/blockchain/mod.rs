//! # ブロックチェーン連携モジュール
//!
//! 署名記録コントラクト呼び出しのエンコードと、EIP-155レガシートランザクションの構築を行う。

pub mod abi;
pub mod evm_tx;
