use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use smart_account::{
    AccountError, GasMeter, Host, ISmartAccount, SmartAccount,
    test_utils::{ACCOUNT, ENTRY_POINT, EcdsaOwner, PasskeyOwner, account_with},
};
use smart_account_core::{Owner, OwnerError};
use smart_account_webauthn::WebAuthnVerifier;

fn call(
    account: &mut SmartAccount,
    host: &mut Host,
    caller: Address,
    data: Vec<u8>,
) -> Result<Bytes, AccountError> {
    account.call(host, caller, U256::ZERO, &data, &mut GasMeter::unlimited())
}

#[test]
fn test_owner_can_manage_owners() {
    let alice = EcdsaOwner::random();
    let passkey = PasskeyOwner::random();
    let mut account = account_with(&[alice.owner()]);
    let mut host = Host::new();

    let key = passkey.key();
    call(
        &mut account,
        &mut host,
        alice.address(),
        ISmartAccount::addOwnerPublicKeyCall { x: key.x, y: key.y }.abi_encode(),
    )
    .unwrap();
    assert!(account.state().is_owner(&passkey.owner()));

    let output = call(
        &mut account,
        &mut host,
        Address::ZERO,
        ISmartAccount::ownerAtIndexCall { index: U256::from(1) }.abi_encode(),
    )
    .unwrap();
    assert_eq!(Bytes::abi_decode(&output).unwrap(), Bytes::from(key.to_bytes().to_vec()));

    let output = call(
        &mut account,
        &mut host,
        Address::ZERO,
        ISmartAccount::ownerCountCall {}.abi_encode(),
    )
    .unwrap();
    assert_eq!(U256::abi_decode(&output).unwrap(), U256::from(2));
}

#[test]
fn test_strangers_cannot_manage_owners() {
    let alice = EcdsaOwner::random();
    let mallory = EcdsaOwner::random();
    let mut account = account_with(&[alice.owner()]);
    let mut host = Host::new();

    assert_eq!(
        call(
            &mut account,
            &mut host,
            mallory.address(),
            ISmartAccount::addOwnerAddressCall { owner: mallory.address() }.abi_encode(),
        ),
        Err(AccountError::UnauthorizedCaller(mallory.address()))
    );
    // the entry point acts through execute, not directly
    assert_eq!(
        call(
            &mut account,
            &mut host,
            ENTRY_POINT,
            ISmartAccount::addOwnerAddressCall { owner: mallory.address() }.abi_encode(),
        ),
        Err(AccountError::UnauthorizedCaller(ENTRY_POINT))
    );
}

#[test]
fn test_removal_checks_stored_owner() {
    let alice = EcdsaOwner::random();
    let bob = EcdsaOwner::random();
    let mut account = account_with(&[alice.owner(), bob.owner()]);
    let mut host = Host::new();

    let wrong = call(
        &mut account,
        &mut host,
        ACCOUNT,
        ISmartAccount::removeOwnerAtIndexCall {
            index: U256::from(1),
            owner: alice.owner().encode(),
        }
        .abi_encode(),
    );
    assert_eq!(
        wrong,
        Err(AccountError::WrongOwnerAtIndex {
            index: 1,
            stored: bob.owner().encode(),
        })
    );

    call(
        &mut account,
        &mut host,
        ACCOUNT,
        ISmartAccount::removeOwnerAtIndexCall {
            index: U256::from(1),
            owner: Bytes::copy_from_slice(bob.address().as_slice()),
        }
        .abi_encode(),
    )
    .unwrap();
    assert!(!account.state().is_owner_address(bob.address()));

    let last = ISmartAccount::removeOwnerAtIndexCall {
        index: U256::ZERO,
        owner: alice.owner().encode(),
    };
    assert_eq!(
        call(&mut account, &mut host, ACCOUNT, last.abi_encode()),
        Err(AccountError::LastOwner)
    );

    let remove_last = ISmartAccount::removeLastOwnerCall {
        index: U256::ZERO,
        owner: alice.owner().encode(),
    };
    call(&mut account, &mut host, ACCOUNT, remove_last.abi_encode()).unwrap();
    assert_eq!(account.state().owner_count(), 0);
    assert_eq!(account.state().next_index(), 2);
}

#[test]
fn test_replayable_calls_apply_owner_changes() {
    let alice = EcdsaOwner::random();
    let mut account = account_with(&[alice.owner()]);
    let mut host = Host::new();
    let bob = Address::repeat_byte(0x0b);

    let add: Bytes = ISmartAccount::addOwnerAddressCall { owner: bob }.abi_encode().into();
    let payload = ISmartAccount::executeWithoutChainIdValidationCall { calls: vec![add.clone()] }.abi_encode();
    assert_eq!(
        call(&mut account, &mut host, alice.address(), payload.clone()),
        Err(AccountError::UnauthorizedCaller(alice.address()))
    );
    call(&mut account, &mut host, ENTRY_POINT, payload).unwrap();
    assert!(account.state().is_owner_address(bob));

    // a failing inner call reverts the ones before it
    let carol = Address::repeat_byte(0x0c);
    let add_carol: Bytes = ISmartAccount::addOwnerAddressCall { owner: carol }.abi_encode().into();
    let payload = ISmartAccount::executeWithoutChainIdValidationCall { calls: vec![add_carol, add] }.abi_encode();
    assert_eq!(
        call(&mut account, &mut host, ENTRY_POINT, payload),
        Err(AccountError::InvalidOwner(OwnerError::AlreadyOwner))
    );
    assert!(!account.state().is_owner_address(carol));
}

#[test]
fn test_initialize_once() {
    let alice = EcdsaOwner::random();
    let mut account = SmartAccount::new(ACCOUNT, ENTRY_POINT, WebAuthnVerifier::default());
    let mut host = Host::new();

    assert_eq!(
        call(
            &mut account,
            &mut host,
            ACCOUNT,
            ISmartAccount::addOwnerAddressCall { owner: alice.address() }.abi_encode(),
        ),
        Err(AccountError::NotInitialized)
    );
    assert_eq!(account.initialize(&[]), Err(AccountError::NoOwners));
    account.initialize(&[alice.owner()]).unwrap();
    assert_eq!(
        account.initialize(&[Owner::address(Address::repeat_byte(1))]),
        Err(AccountError::AlreadyInitialized)
    );
    assert!(!account.state().is_owner_bytes(B256::repeat_byte(1).as_slice()));
}
