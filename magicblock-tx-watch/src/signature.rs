use solana_sdk::signature::Signature;

use crate::{
    consts::SIGNATURE_BYTES,
    errors::{TxWatchError, TxWatchResult},
};

/// Parses a base58 encoded transaction signature.
/// Only input that decodes to exactly 64 bytes is accepted.
pub fn parse_signature(raw: &str) -> TxWatchResult<Signature> {
    let invalid = || TxWatchError::InvalidSignature(raw.to_string());
    let bytes = bs58::decode(raw.trim()).into_vec().map_err(|_| invalid())?;
    if bytes.len() != SIGNATURE_BYTES {
        return Err(invalid());
    }
    Signature::try_from(bytes.as_slice()).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_parse_valid_signature() {
        let signature = Signature::from([3u8; 64]);
        let parsed = parse_signature(&signature.to_string()).unwrap();
        assert_eq!(parsed, signature);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let short = bs58::encode([1u8; 32]).into_string();
        assert_matches!(
            parse_signature(&short),
            Err(TxWatchError::InvalidSignature(raw)) if raw == short
        );
    }

    #[test]
    fn test_parse_rejects_non_base58() {
        assert_matches!(
            parse_signature("not-a-signature-0OIl"),
            Err(TxWatchError::InvalidSignature(_))
        );
        assert_matches!(
            parse_signature(""),
            Err(TxWatchError::InvalidSignature(_))
        );
    }
}
