//! Token-specific transfer construction.
//!
//! STX moves with a native token-transfer payload. sBTC and USDCx are SIP-010
//! tokens and move with a call to the token contract's `transfer` function;
//! both go through the same [`Sip010Token`] path and differ only in their
//! label and default contracts.

use crate::errors::{Result, X402Error};
use crate::stacks::clarity::ClarityValue;
use crate::types::{Network, PaymentDetails, TokenContract, TokenType};
use crate::utils::{parse_amount_u128, parse_amount_u64};

/// SIP-010 function every fungible token exposes for transfers.
pub const SIP010_TRANSFER_FUNCTION: &str = "transfer";

/// A transfer ready to be signed by a [`ChainSdk`](crate::stacks::ChainSdk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTransfer {
    /// Native STX transfer
    Native {
        /// Recipient address
        recipient: String,
        /// Amount in micro-STX
        amount: u64,
        /// Memo, at most 34 bytes
        memo: Option<String>,
    },
    /// Contract call moving a fungible token
    ContractCall {
        /// Token contract
        contract: TokenContract,
        /// Function to call
        function_name: String,
        /// Arguments, in declaration order
        args: Vec<ClarityValue>,
    },
}

/// Label and well-known deployments of a SIP-010 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sip010Token {
    /// Display label
    pub label: &'static str,
    /// `(address, name)` on mainnet
    pub mainnet: (&'static str, &'static str),
    /// `(address, name)` on testnet
    pub testnet: (&'static str, &'static str),
}

/// sBTC deployments.
pub const SBTC: Sip010Token = Sip010Token {
    label: "sBTC",
    mainnet: ("SM3VDXK3WZZSA84XXFKAFAF15NNZX32CTSG82JFQ4", "sbtc-token"),
    testnet: ("ST1F7QA2MDF17S807EPA36TSS8AMEFY4KA9TVGWXT", "sbtc-token"),
};

/// USDCx deployments.
pub const USDCX: Sip010Token = Sip010Token {
    label: "USDCx",
    mainnet: ("SP120SBRBQJ00MCWS7TM5R8WJNTTKD5K0HFRC2CNE", "usdcx"),
    testnet: ("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM", "usdcx"),
};

impl Sip010Token {
    /// Default contract on `network`.
    pub fn contract(&self, network: Network) -> TokenContract {
        let (address, name) = match network {
            Network::Mainnet => self.mainnet,
            Network::Testnet => self.testnet,
        };
        TokenContract::new(address, name)
    }
}

/// Transfer construction strategy for a token type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoder {
    /// Native STX transfer
    Native,
    /// SIP-010 `transfer` contract call
    Sip010(Sip010Token),
}

impl TransferEncoder {
    /// Selects the encoder for `token_type`.
    pub fn for_token(token_type: TokenType) -> Self {
        match token_type {
            TokenType::Stx => TransferEncoder::Native,
            TokenType::Sbtc => TransferEncoder::Sip010(SBTC),
            TokenType::Usdcx => TransferEncoder::Sip010(USDCX),
        }
    }

    /// Label of the token this encoder moves.
    pub fn label(&self) -> &'static str {
        match self {
            TransferEncoder::Native => "STX",
            TransferEncoder::Sip010(token) => token.label,
        }
    }

    /// Well-known contract on `network`; `None` for STX.
    pub fn default_contract(&self, network: Network) -> Option<TokenContract> {
        match self {
            TransferEncoder::Native => None,
            TransferEncoder::Sip010(token) => Some(token.contract(network)),
        }
    }

    /// Builds the unsigned transfer described by `details`, sent by `sender`.
    ///
    /// A fungible transfer requires `details.token_contract`; the default
    /// contract is never substituted.
    pub fn encode(&self, details: &PaymentDetails, sender: &str) -> Result<UnsignedTransfer> {
        match self {
            TransferEncoder::Native => Ok(UnsignedTransfer::Native {
                recipient: details.recipient.clone(),
                amount: parse_amount_u64(&details.amount)?,
                memo: details.memo.clone(),
            }),
            TransferEncoder::Sip010(token) => {
                let contract = details.token_contract.clone().ok_or_else(|| {
                    X402Error::Signing(format!(
                        "missing token contract for {} payment",
                        token.label
                    ))
                })?;

                let memo = match details.memo.as_deref() {
                    Some(memo) if !memo.is_empty() => {
                        ClarityValue::some(ClarityValue::Buffer(memo.as_bytes().to_vec()))
                    }
                    _ => ClarityValue::OptionalNone,
                };

                Ok(UnsignedTransfer::ContractCall {
                    contract,
                    function_name: SIP010_TRANSFER_FUNCTION.to_string(),
                    args: vec![
                        ClarityValue::UInt(parse_amount_u128(&details.amount)?),
                        ClarityValue::principal(sender)?,
                        ClarityValue::principal(&details.recipient)?,
                        memo,
                    ],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentRequest;

    const SENDER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";
    const RECIPIENT: &str = "ST2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKQYAC0RQ";

    fn details(token_type: TokenType, amount: &str) -> PaymentDetails {
        let request = PaymentRequest {
            max_amount_required: amount.to_string(),
            resource: "/r".to_string(),
            pay_to: RECIPIENT.to_string(),
            network: Network::Testnet,
            nonce: "abc123".to_string(),
            expires_at: "2030-01-01T00:00:00Z".to_string(),
            memo: None,
            token_type: Some(token_type),
            token_contract: token_type.default_contract(Network::Testnet),
        };
        PaymentDetails::from_request(&request, "unused")
    }

    #[test]
    fn test_native_transfer() {
        let transfer = TransferEncoder::for_token(TokenType::Stx)
            .encode(&details(TokenType::Stx, "1000000"), SENDER)
            .unwrap();
        assert_eq!(
            transfer,
            UnsignedTransfer::Native {
                recipient: RECIPIENT.to_string(),
                amount: 1_000_000,
                memo: Some("abc123".to_string()),
            }
        );
    }

    #[test]
    fn test_native_amount_must_fit_u64() {
        let huge = (u64::MAX as u128 + 1).to_string();
        let err = TransferEncoder::Native
            .encode(&details(TokenType::Stx, &huge), SENDER)
            .unwrap_err();
        assert!(matches!(err, X402Error::InvalidAmount(_)));
    }

    #[test]
    fn test_sip010_transfer_arguments() {
        let transfer = TransferEncoder::for_token(TokenType::Sbtc)
            .encode(&details(TokenType::Sbtc, "2500"), SENDER)
            .unwrap();

        let UnsignedTransfer::ContractCall {
            contract,
            function_name,
            args,
        } = transfer
        else {
            panic!("expected a contract call");
        };
        assert_eq!(
            contract.identifier(),
            "ST1F7QA2MDF17S807EPA36TSS8AMEFY4KA9TVGWXT.sbtc-token"
        );
        assert_eq!(function_name, "transfer");
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], ClarityValue::UInt(2500));
        assert_eq!(args[1], ClarityValue::principal(SENDER).unwrap());
        assert_eq!(args[2], ClarityValue::principal(RECIPIENT).unwrap());
        assert_eq!(
            args[3],
            ClarityValue::some(ClarityValue::Buffer(b"abc123".to_vec()))
        );
    }

    #[test]
    fn test_sip010_without_memo_passes_none() {
        let mut details = details(TokenType::Usdcx, "1");
        details.memo = None;
        let transfer = TransferEncoder::for_token(TokenType::Usdcx)
            .encode(&details, SENDER)
            .unwrap();
        match transfer {
            UnsignedTransfer::ContractCall { args, .. } => {
                assert_eq!(args[3], ClarityValue::OptionalNone)
            }
            other => panic!("unexpected transfer {:?}", other),
        }
    }

    #[test]
    fn test_sip010_requires_contract() {
        for token in [TokenType::Sbtc, TokenType::Usdcx] {
            let mut details = details(token, "1");
            details.token_contract = None;
            let err = TransferEncoder::for_token(token)
                .encode(&details, SENDER)
                .unwrap_err();
            let message = err.to_string().to_lowercase();
            assert!(message.contains("missing"), "{}", message);
            assert!(message.contains("contract"), "{}", message);
        }
    }

    #[test]
    fn test_default_contracts() {
        assert_eq!(TokenType::Stx.default_contract(Network::Mainnet), None);
        assert_eq!(
            TokenType::Usdcx
                .default_contract(Network::Mainnet)
                .unwrap()
                .identifier(),
            "SP120SBRBQJ00MCWS7TM5R8WJNTTKD5K0HFRC2CNE.usdcx"
        );
        assert_eq!(TransferEncoder::for_token(TokenType::Sbtc).label(), "sBTC");
    }
}
