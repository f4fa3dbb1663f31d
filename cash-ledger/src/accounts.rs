//! Ledger account store: initialization and friend lists

use crate::auth::require_owner;
use crate::instruction::Outcome;
use crate::processor::TxContext;
use crate::types::{Account, Identity};
use crate::{Error, Result};

/// Create `owner`'s account; the signer pays the storage deposit
pub fn initialize_account(ctx: &mut TxContext<'_>, owner: Identity) -> Result<Outcome> {
    if ctx.try_account(&owner)?.is_some() {
        return Err(Error::AlreadyExists(format!("account of {}", owner)));
    }

    let payer = ctx.signer();
    let space = Account::space(ctx.config().accounts.max_friends);
    let rent_reserve = ctx.charge_rent(&payer, space)?;

    let account = Account::new(owner, rent_reserve, ctx.now());
    let key = account.key();
    ctx.put_account(account);

    tracing::info!(
        owner = %owner,
        payer = %payer,
        account = %key,
        rent_reserve,
        "Account initialized"
    );

    Ok(Outcome::AccountInitialized {
        owner,
        account: key,
        rent_reserve,
    })
}

/// Add `friend` to the owner's list; adding a present friend changes nothing
pub fn add_friend(ctx: &mut TxContext<'_>, owner: Identity, friend: Identity) -> Result<Outcome> {
    require_owner(&ctx.signer(), &owner, "add friend")?;
    if friend == owner {
        return Err(Error::InvalidInstruction(format!(
            "{} cannot befriend itself",
            owner
        )));
    }

    let mut account = ctx.account(&owner)?;
    if !account.has_friend(&friend) {
        let capacity = ctx.config().accounts.max_friends;
        if account.friends.len() >= capacity {
            return Err(Error::FriendListFull(format!(
                "account {} already holds {} friends",
                owner, capacity
            )));
        }
        account.friends.push(friend);
        tracing::debug!(owner = %owner, friend = %friend, "Friend added");
    }

    let friends = account.friends.clone();
    ctx.put_account(account);
    Ok(Outcome::FriendsUpdated { owner, friends })
}

/// Remove `friend` from the owner's list
pub fn remove_friend(
    ctx: &mut TxContext<'_>,
    owner: Identity,
    friend: Identity,
) -> Result<Outcome> {
    require_owner(&ctx.signer(), &owner, "remove friend")?;

    let mut account = ctx.account(&owner)?;
    let position = account
        .friends
        .iter()
        .position(|peer| peer == &friend)
        .ok_or_else(|| Error::NotFound(format!("{} is not a friend of {}", friend, owner)))?;
    account.friends.remove(position);
    tracing::debug!(owner = %owner, friend = %friend, "Friend removed");

    let friends = account.friends.clone();
    ctx.put_account(account);
    Ok(Outcome::FriendsUpdated { owner, friends })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{identity, Fixture};

    #[test]
    fn test_initialize_charges_payer() {
        let fx = Fixture::new();
        let (alice, sponsor) = (identity(1), identity(2));
        let rent = fx
            .config
            .rent
            .minimum_for(Account::space(fx.config.accounts.max_friends));
        fx.fund(sponsor, rent + 5);

        let mut ctx = fx.ctx(sponsor);
        let outcome = initialize_account(&mut ctx, alice).unwrap();
        fx.apply(ctx);

        assert!(matches!(
            outcome,
            Outcome::AccountInitialized { owner, rent_reserve, .. }
                if owner == alice && rent_reserve == rent
        ));
        let account = fx.account(&alice);
        assert_eq!(account.balance, 0);
        assert_eq!(account.rent_reserve, rent);
        assert!(account.friends.is_empty());
        assert_eq!(fx.wallet_balance(&sponsor), 5);
    }

    #[test]
    fn test_initialize_twice_fails() {
        let fx = Fixture::new();
        let alice = identity(1);
        fx.open_account(alice, 0);
        fx.fund(alice, 10_000);

        let mut ctx = fx.ctx(alice);
        assert!(matches!(
            initialize_account(&mut ctx, alice),
            Err(Error::AlreadyExists(_))
        ));
        assert!(ctx.into_changes().wallets.is_empty());
    }

    #[test]
    fn test_initialize_without_rent_fails() {
        let fx = Fixture::new();
        let alice = identity(1);
        fx.fund(alice, 3);

        let mut ctx = fx.ctx(alice);
        assert!(matches!(
            initialize_account(&mut ctx, alice),
            Err(Error::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_friend_list_is_a_bounded_set() {
        let fx = Fixture::new();
        let alice = identity(1);
        fx.open_account(alice, 0);

        let mut ctx = fx.ctx(alice);
        add_friend(&mut ctx, alice, identity(2)).unwrap();
        // Re-adding is a no-op
        let outcome = add_friend(&mut ctx, alice, identity(2)).unwrap();
        assert_eq!(
            outcome,
            Outcome::FriendsUpdated {
                owner: alice,
                friends: vec![identity(2)]
            }
        );
        add_friend(&mut ctx, alice, identity(3)).unwrap();
        assert!(matches!(
            add_friend(&mut ctx, alice, identity(4)),
            Err(Error::FriendListFull(_))
        ));
        assert!(matches!(
            add_friend(&mut ctx, alice, alice),
            Err(Error::InvalidInstruction(_))
        ));
        fx.apply(ctx);

        assert_eq!(fx.account(&alice).friends, vec![identity(2), identity(3)]);
    }

    #[test]
    fn test_remove_friend() {
        let fx = Fixture::new();
        let alice = identity(1);
        fx.open_account(alice, 0);

        let mut ctx = fx.ctx(alice);
        add_friend(&mut ctx, alice, identity(2)).unwrap();
        add_friend(&mut ctx, alice, identity(3)).unwrap();
        remove_friend(&mut ctx, alice, identity(2)).unwrap();
        assert!(matches!(
            remove_friend(&mut ctx, alice, identity(2)),
            Err(Error::NotFound(_))
        ));
        fx.apply(ctx);

        assert_eq!(fx.account(&alice).friends, vec![identity(3)]);
    }

    #[test]
    fn test_friend_changes_require_owner() {
        let fx = Fixture::new();
        let alice = identity(1);
        fx.open_account(alice, 0);

        let mut ctx = fx.ctx(identity(9));
        assert!(matches!(
            add_friend(&mut ctx, alice, identity(2)),
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            remove_friend(&mut ctx, alice, identity(2)),
            Err(Error::Unauthorized(_))
        ));
    }
}
