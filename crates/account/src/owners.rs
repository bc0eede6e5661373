//! Owner registry.
use alloy_primitives::{Address, B256};
use smart_account_core::{Owner, OwnerError};
use tracing::info;

use crate::{error::AccountError, state::AccountState};

impl AccountState {
    /// Registers owners at account creation.
    pub fn initialize(&mut self, owners: &[Owner]) -> Result<(), AccountError> {
        if self.initialized {
            return Err(AccountError::AlreadyInitialized);
        }
        if owners.is_empty() {
            return Err(AccountError::NoOwners);
        }
        let mut staged = self.clone();
        for owner in owners {
            staged.insert_owner(*owner)?;
        }
        staged.initialized = true;
        *self = staged;
        Ok(())
    }

    /// Adds an owner from any accepted raw encoding.
    pub fn add_owner(&mut self, raw: &[u8]) -> Result<u64, AccountError> {
        self.insert_owner(Owner::from_bytes(raw)?)
    }

    pub fn add_owner_address(&mut self, address: Address) -> Result<u64, AccountError> {
        self.add_owner(address.as_slice())
    }

    pub fn add_owner_public_key(&mut self, x: B256, y: B256) -> Result<u64, AccountError> {
        let owner = Owner::passkey(x, y);
        if owner.is_zero() {
            return Err(OwnerError::ZeroOwner.into());
        }
        self.insert_owner(owner)
    }

    fn insert_owner(&mut self, owner: Owner) -> Result<u64, AccountError> {
        if owner.is_zero() {
            return Err(OwnerError::ZeroOwner.into());
        }
        if self.members.contains(&owner) {
            return Err(OwnerError::AlreadyOwner.into());
        }
        let index = self.next_index;
        self.owners.insert(index, owner);
        self.members.insert(owner);
        self.next_index += 1;
        info!(index, owner = %owner.encode(), "owner added");
        Ok(index)
    }

    /// Removes the owner at `index`. The last remaining owner cannot be
    /// removed this way.
    pub fn remove_owner_at_index(&mut self, index: u64) -> Result<Owner, AccountError> {
        if !self.owners.contains_key(&index) {
            return Err(AccountError::NoOwnerAtIndex(index));
        }
        if self.owner_count() == 1 {
            return Err(AccountError::LastOwner);
        }
        self.delete_owner(index)
    }

    /// Like [`Self::remove_owner_at_index`] but only if the stored owner
    /// equals `expected`.
    pub fn remove_owner_at_index_checked(
        &mut self,
        index: u64,
        expected: &[u8],
    ) -> Result<Owner, AccountError> {
        self.check_owner_at(index, expected)?;
        self.remove_owner_at_index(index)
    }

    /// Removes the sole remaining owner, leaving the account ownerless.
    pub fn remove_last_owner(
        &mut self,
        index: u64,
        expected: &[u8],
    ) -> Result<Owner, AccountError> {
        let remaining = self.owner_count();
        if remaining != 1 {
            return Err(AccountError::NotLastOwner { remaining });
        }
        self.check_owner_at(index, expected)?;
        self.delete_owner(index)
    }

    fn check_owner_at(&self, index: u64, expected: &[u8]) -> Result<(), AccountError> {
        let stored = self
            .owners
            .get(&index)
            .ok_or(AccountError::NoOwnerAtIndex(index))?;
        let matches = Owner::from_bytes(expected).is_ok_and(|owner| owner == *stored);
        if !matches {
            return Err(AccountError::WrongOwnerAtIndex {
                index,
                stored: stored.encode(),
            });
        }
        Ok(())
    }

    fn delete_owner(&mut self, index: u64) -> Result<Owner, AccountError> {
        let owner = self
            .owners
            .remove(&index)
            .ok_or(AccountError::NoOwnerAtIndex(index))?;
        self.members.remove(&owner);
        info!(index, owner = %owner.encode(), "owner removed");
        Ok(owner)
    }

    pub fn owner_at(&self, index: u64) -> Option<&Owner> {
        self.owners.get(&index)
    }

    pub fn is_owner(&self, owner: &Owner) -> bool {
        self.members.contains(owner)
    }

    /// Membership by raw encoding, malformed input is simply not an owner.
    pub fn is_owner_bytes(&self, raw: &[u8]) -> bool {
        Owner::from_bytes(raw).is_ok_and(|owner| self.is_owner(&owner))
    }

    pub fn is_owner_address(&self, address: Address) -> bool {
        self.is_owner(&Owner::address(address))
    }

    pub const fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }
}
