use alloy_primitives::{Address, Bytes, U256, address};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use smart_account_core::{PackedUserOperation, encode_paymaster_and_data, pack_gas_pair};
use smart_account_paymaster::{
    DEFAULT_PERIOD_SECS, Paymaster, SpendPolicyConfig, SponsorContext, SponsorError,
    SponsorPaymaster, sponsor_digest,
};

const ENTRY_POINT: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");
const SPONSOR: Address = address!("00000000000000000000000000000000005ec0de");
const CHAIN_ID: u64 = 8453;

fn ether(tenths: u64) -> U256 {
    U256::from(tenths) * U256::from(100_000_000_000_000_000u64)
}

fn ctx(timestamp: u64, max_cost: U256) -> SponsorContext {
    SponsorContext {
        entry_point: ENTRY_POINT,
        chain_id: CHAIN_ID,
        timestamp,
        max_cost,
    }
}

fn sponsored_op(signer: &PrivateKeySigner, sender: Address, max_cost: U256) -> PackedUserOperation {
    let mut op = PackedUserOperation {
        sender,
        account_gas_limits: pack_gas_pair(100_000, 200_000),
        gas_fees: pack_gas_pair(1, 10),
        paymaster_and_data: encode_paymaster_and_data(SPONSOR, 50_000, 30_000, &[]),
        ..Default::default()
    };
    let digest = sponsor_digest(&op, ENTRY_POINT, CHAIN_ID, max_cost, SPONSOR);
    let signature = signer.sign_hash_sync(&digest).unwrap();
    op.paymaster_and_data =
        encode_paymaster_and_data(SPONSOR, 50_000, 30_000, &signature.as_bytes());
    op
}

fn paymaster(signer: &PrivateKeySigner) -> SponsorPaymaster {
    SponsorPaymaster::new(SPONSOR, SpendPolicyConfig::new(ether(10), signer.address()))
}

#[test]
fn test_cap_rejects_second_operation_until_rollover() {
    let signer = PrivateKeySigner::random();
    let mut paymaster = paymaster(&signer);
    let sender = Address::repeat_byte(0x11);
    let op = sponsored_op(&signer, sender, ether(6));

    paymaster.validate(&op, &ctx(1_000, ether(6))).unwrap();
    assert_eq!(
        paymaster.validate(&op, &ctx(1_010, ether(6))),
        Err(SponsorError::SpendingCapExceeded {
            spent: ether(6),
            max_cost: ether(6),
            cap: ether(10),
        })
    );

    let next_period = DEFAULT_PERIOD_SECS + 5;
    paymaster.validate(&op, &ctx(next_period, ether(6))).unwrap();
    assert_eq!(paymaster.record().spent(sender), ether(6));
}

#[test]
fn test_caps_are_per_account() {
    let signer = PrivateKeySigner::random();
    let mut paymaster = paymaster(&signer);
    let alice = sponsored_op(&signer, Address::repeat_byte(0xa1), ether(6));
    let bob = sponsored_op(&signer, Address::repeat_byte(0xb0), ether(6));

    paymaster.validate(&alice, &ctx(10, ether(6))).unwrap();
    paymaster.validate(&bob, &ctx(10, ether(6))).unwrap();
}

#[test]
fn test_settlement_refunds_unused_allowance() {
    let signer = PrivateKeySigner::random();
    let mut paymaster = paymaster(&signer);
    let sender = Address::repeat_byte(0x22);
    let op = sponsored_op(&signer, sender, ether(6));

    let reservation = paymaster.validate(&op, &ctx(10, ether(6))).unwrap();
    let refund = paymaster.settle(reservation.id, ether(2)).unwrap();
    assert_eq!(refund, ether(4));
    assert_eq!(paymaster.record().spent(sender), ether(2));

    // the refunded allowance covers another operation
    paymaster.validate(&op, &ctx(20, ether(6))).unwrap();
    assert_eq!(
        paymaster.settle(reservation.id, U256::ZERO),
        Err(SponsorError::UnknownReservation(reservation.id))
    );
}

#[test]
fn test_release_undoes_reservation() {
    let signer = PrivateKeySigner::random();
    let mut paymaster = paymaster(&signer);
    let sender = Address::repeat_byte(0x33);
    let op = sponsored_op(&signer, sender, ether(6));

    let reservation = paymaster.validate(&op, &ctx(10, ether(6))).unwrap();
    paymaster.release(reservation.id).unwrap();
    assert_eq!(paymaster.record().spent(sender), U256::ZERO);
}

#[test]
fn test_authorization_is_checked() {
    let signer = PrivateKeySigner::random();
    let other = PrivateKeySigner::random();
    let mut paymaster = paymaster(&signer);
    let sender = Address::repeat_byte(0x44);

    let forged = sponsored_op(&other, sender, ether(1));
    assert_eq!(
        paymaster.validate(&forged, &ctx(10, ether(1))),
        Err(SponsorError::InvalidSponsorSignature)
    );

    // signed for a smaller max cost
    let op = sponsored_op(&signer, sender, ether(1));
    assert_eq!(
        paymaster.validate(&op, &ctx(10, ether(2))),
        Err(SponsorError::InvalidSponsorSignature)
    );

    let mut truncated = op;
    truncated.paymaster_and_data = Bytes::from(truncated.paymaster_and_data[..60].to_vec());
    assert_eq!(
        paymaster.validate(&truncated, &ctx(10, ether(1))),
        Err(SponsorError::InvalidSponsorData)
    );
    assert_eq!(paymaster.record().spent(sender), U256::ZERO);
}
