//! Authorization and signature gate
//!
//! Signatures are checked before a transaction takes any lock or reads any
//! record for mutation. Ownership rules are checked by each operation
//! against the records it loads, before it stages a single write.

use crate::instruction::SignedTransaction;
use crate::types::Identity;
use crate::{Error, Result};

/// Reject transactions whose signature does not match the declared signer
pub fn verify_transaction(signed: &SignedTransaction) -> Result<()> {
    if !signed.verify()? {
        return Err(Error::Unauthorized(format!(
            "invalid signature for signer {}",
            signed.signer()
        )));
    }
    Ok(())
}

/// Require `signer` to be `owner`
pub fn require_owner(signer: &Identity, owner: &Identity, action: &str) -> Result<()> {
    if signer != owner {
        return Err(Error::Unauthorized(format!(
            "{} requires signature of {}, signed by {}",
            action, owner, signer
        )));
    }
    Ok(())
}

/// Require `signer` to be one of `parties`
pub fn require_party(signer: &Identity, parties: &[Identity], action: &str) -> Result<()> {
    if !parties.contains(signer) {
        return Err(Error::Unauthorized(format!(
            "{} not permitted for {}",
            action, signer
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::instruction::{Instruction, Transaction};

    #[test]
    fn test_require_owner() {
        let alice = Identity::new([1u8; 32]);
        let bob = Identity::new([2u8; 32]);

        assert!(require_owner(&alice, &alice, "withdraw").is_ok());
        let err = require_owner(&bob, &alice, "withdraw").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn test_require_party() {
        let alice = Identity::new([1u8; 32]);
        let bob = Identity::new([2u8; 32]);
        let carol = Identity::new([3u8; 32]);

        assert!(require_party(&bob, &[alice, bob], "decline request").is_ok());
        assert!(require_party(&carol, &[alice, bob], "decline request").is_err());
    }

    #[test]
    fn test_verify_transaction_rejects_forged_signer() {
        let victim = KeyPair::from_seed(&[1u8; 32]);
        let mallory = KeyPair::from_seed(&[2u8; 32]);
        let forged = Transaction::new(
            victim.identity(),
            0,
            Instruction::Withdraw {
                owner: victim.identity(),
                amount: 1,
            },
        )
        .sign(&mallory)
        .unwrap();

        assert!(matches!(
            verify_transaction(&forged),
            Err(Error::Unauthorized(_))
        ));
    }
}
