//! ERC-4337 packed user operation and its hashing.
use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolValue, sol};
use serde::{Deserialize, Serialize};

use crate::nonce::Nonce;

sol! {
    struct PackedUserOperationStruct {
        bytes32 userOpTypeHash;
        address sender;
        uint256 nonce;
        bytes32 initCodeHash;
        bytes32 callDataHash;
        bytes32 accountGasLimits;
        uint256 preVerificationGas;
        bytes32 gasFees;
        bytes32 paymasterAndDataHash;
    }

    struct DomainSeparatorData {
        bytes32 typeHash;
        bytes32 nameHash;
        bytes32 versionHash;
        uint256 chainId;
        address verifyingContract;
    }

    struct ChainAgnosticDomainSeparatorData {
        bytes32 typeHash;
        bytes32 nameHash;
        bytes32 versionHash;
        address verifyingContract;
    }
}

pub const USEROP_TYPEHASH: &str = "PackedUserOperation(address sender,uint256 nonce,bytes initCode,bytes callData,bytes32 accountGasLimits,uint256 preVerificationGas,bytes32 gasFees,bytes paymasterAndData)";
pub const EIP712_DOMAIN_TYPEHASH: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
/// Domain used for replayable operations, the chain id field is left out.
pub const EIP712_CHAIN_AGNOSTIC_DOMAIN_TYPEHASH: &str =
    "EIP712Domain(string name,string version,address verifyingContract)";

const DOMAIN_NAME: &str = "ERC4337";
const DOMAIN_VERSION: &str = "1";

/// Length of `sponsor(20) ‖ verificationGasLimit(16) ‖ postOpGasLimit(16)`.
pub const SPONSOR_DATA_OFFSET: usize = 52;

/// Packed user operation as submitted to the entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedUserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    /// `verificationGasLimit(16) ‖ callGasLimit(16)`
    pub account_gas_limits: B256,
    pub pre_verification_gas: U256,
    /// `maxPriorityFeePerGas(16) ‖ maxFeePerGas(16)`
    pub gas_fees: B256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl PackedUserOperation {
    pub fn nonce(&self) -> Nonce {
        Nonce::from(self.nonce)
    }

    pub fn verification_gas_limit(&self) -> u128 {
        unpack_gas_pair(self.account_gas_limits).0
    }

    pub fn call_gas_limit(&self) -> u128 {
        unpack_gas_pair(self.account_gas_limits).1
    }

    pub fn max_priority_fee_per_gas(&self) -> u128 {
        unpack_gas_pair(self.gas_fees).0
    }

    pub fn max_fee_per_gas(&self) -> u128 {
        unpack_gas_pair(self.gas_fees).1
    }

    /// First four bytes of the call payload.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.call_data.get(..4).map(|s| [s[0], s[1], s[2], s[3]])
    }

    pub fn paymaster(&self) -> Option<Address> {
        self.paymaster_and_data
            .get(..20)
            .map(Address::from_slice)
    }

    pub fn paymaster_verification_gas_limit(&self) -> u128 {
        self.paymaster_and_data
            .get(20..36)
            .map(u128_from_be_slice)
            .unwrap_or_default()
    }

    pub fn paymaster_post_op_gas_limit(&self) -> u128 {
        self.paymaster_and_data
            .get(36..SPONSOR_DATA_OFFSET)
            .map(u128_from_be_slice)
            .unwrap_or_default()
    }

    /// Sponsor authorization bytes that follow the fixed sponsor header.
    pub fn paymaster_data(&self) -> &[u8] {
        self.paymaster_and_data
            .get(SPONSOR_DATA_OFFSET..)
            .unwrap_or_default()
    }

    /// Upper bound on gas this operation may consume.
    pub fn max_gas(&self) -> U256 {
        U256::from(self.verification_gas_limit())
            + U256::from(self.call_gas_limit())
            + U256::from(self.paymaster_verification_gas_limit())
            + U256::from(self.paymaster_post_op_gas_limit())
            + self.pre_verification_gas
    }

    /// Maximum amount the payer can be charged.
    pub fn max_cost(&self) -> U256 {
        self.max_gas()
            .saturating_mul(U256::from(self.max_fee_per_gas()))
    }

    /// EIP-712 struct hash of the operation, the signature excluded.
    pub fn struct_hash(&self) -> B256 {
        let encoded = PackedUserOperationStruct {
            userOpTypeHash: keccak256(USEROP_TYPEHASH.as_bytes()),
            sender: self.sender,
            nonce: self.nonce,
            initCodeHash: keccak256(&self.init_code),
            callDataHash: keccak256(&self.call_data),
            accountGasLimits: self.account_gas_limits,
            preVerificationGas: self.pre_verification_gas,
            gasFees: self.gas_fees,
            paymasterAndDataHash: keccak256(&self.paymaster_and_data),
        }
        .abi_encode();
        keccak256(encoded)
    }

    /// Operation hash bound to the entry point and chain.
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        to_typed_data_hash(
            compute_domain_separator(chain_id, entry_point),
            self.struct_hash(),
        )
    }

    /// Operation hash that is identical on every chain the account lives on.
    pub fn hash_without_chain_id(&self, entry_point: Address) -> B256 {
        to_typed_data_hash(
            compute_chain_agnostic_domain_separator(entry_point),
            self.struct_hash(),
        )
    }

    /// Hash a sponsor signs over. The authorization bytes are cut off so the
    /// signature does not commit to itself.
    pub fn sponsor_hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        let mut stripped = self.clone();
        if stripped.paymaster_and_data.len() > SPONSOR_DATA_OFFSET {
            stripped.paymaster_and_data =
                Bytes::copy_from_slice(&self.paymaster_and_data[..SPONSOR_DATA_OFFSET]);
        }
        stripped.hash(entry_point, chain_id)
    }
}

/// Packs two 128-bit values into a word, `hi` in the upper half.
pub fn pack_gas_pair(hi: u128, lo: u128) -> B256 {
    let mask = (U256::from(1u64) << 128usize) - U256::from(1u64);
    let hi = U256::from(hi) & mask;
    let lo = U256::from(lo) & mask;
    B256::from((hi << 128usize) | lo)
}

pub fn unpack_gas_pair(word: B256) -> (u128, u128) {
    (
        u128_from_be_slice(&word[..16]),
        u128_from_be_slice(&word[16..]),
    )
}

fn u128_from_be_slice(bytes: &[u8]) -> u128 {
    let mut buf = [0u8; 16];
    buf[16 - bytes.len()..].copy_from_slice(bytes);
    u128::from_be_bytes(buf)
}

/// Builds `sponsor ‖ verificationGasLimit ‖ postOpGasLimit ‖ data`.
pub fn encode_paymaster_and_data(
    paymaster: Address,
    verification_gas_limit: u128,
    post_op_gas_limit: u128,
    data: &[u8],
) -> Bytes {
    let mut buf = Vec::with_capacity(SPONSOR_DATA_OFFSET + data.len());
    buf.extend_from_slice(paymaster.as_slice());
    buf.extend_from_slice(&verification_gas_limit.to_be_bytes());
    buf.extend_from_slice(&post_op_gas_limit.to_be_bytes());
    buf.extend_from_slice(data);
    Bytes::from(buf)
}

pub fn compute_domain_separator(chain_id: u64, entry_point: Address) -> B256 {
    let data = DomainSeparatorData {
        typeHash: keccak256(EIP712_DOMAIN_TYPEHASH.as_bytes()),
        nameHash: keccak256(DOMAIN_NAME.as_bytes()),
        versionHash: keccak256(DOMAIN_VERSION.as_bytes()),
        chainId: U256::from(chain_id),
        verifyingContract: entry_point,
    };

    keccak256(data.abi_encode())
}

pub fn compute_chain_agnostic_domain_separator(entry_point: Address) -> B256 {
    let data = ChainAgnosticDomainSeparatorData {
        typeHash: keccak256(EIP712_CHAIN_AGNOSTIC_DOMAIN_TYPEHASH.as_bytes()),
        nameHash: keccak256(DOMAIN_NAME.as_bytes()),
        versionHash: keccak256(DOMAIN_VERSION.as_bytes()),
        verifyingContract: entry_point,
    };

    keccak256(data.abi_encode())
}

pub fn to_typed_data_hash(domain_separator: B256, struct_hash: B256) -> B256 {
    // 0x19 0x01 ‖ domain separator ‖ struct hash
    let mut enc = [0u8; 66];
    enc[0] = 0x19;
    enc[1] = 0x01;
    enc[2..34].copy_from_slice(domain_separator.as_slice());
    enc[34..66].copy_from_slice(struct_hash.as_slice());

    keccak256(enc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, bytes};

    fn sample_op() -> PackedUserOperation {
        PackedUserOperation {
            sender: address!("6A84A0cF27291eF29042305547a898D3861F05f3"),
            nonce: U256::from(7),
            init_code: Bytes::new(),
            call_data: bytes!("e9ae5c53"),
            account_gas_limits: pack_gas_pair(100_000, 200_000),
            pre_verification_gas: U256::from(21_000),
            gas_fees: pack_gas_pair(1_000_000_000, 3_000_000_000),
            paymaster_and_data: Bytes::new(),
            signature: bytes!("00"),
        }
    }

    #[test]
    fn should_unpack_gas_fields() {
        let op = sample_op();
        assert_eq!(op.verification_gas_limit(), 100_000);
        assert_eq!(op.call_gas_limit(), 200_000);
        assert_eq!(op.max_priority_fee_per_gas(), 1_000_000_000);
        assert_eq!(op.max_fee_per_gas(), 3_000_000_000);
        assert_eq!(op.max_gas(), U256::from(321_000));
        assert_eq!(
            op.max_cost(),
            U256::from(321_000u64) * U256::from(3_000_000_000u64)
        );
    }

    #[test]
    fn should_read_paymaster_fields() {
        let sponsor = address!("3333333333333333333333333333333333333333");
        let mut op = sample_op();
        op.paymaster_and_data = encode_paymaster_and_data(sponsor, 50_000, 10_000, &[0xaa; 65]);

        assert_eq!(op.paymaster(), Some(sponsor));
        assert_eq!(op.paymaster_verification_gas_limit(), 50_000);
        assert_eq!(op.paymaster_post_op_gas_limit(), 10_000);
        assert_eq!(op.paymaster_data(), &[0xaa; 65][..]);
        assert_eq!(op.max_gas(), U256::from(381_000));
    }

    #[test]
    fn signature_is_not_part_of_the_hash() {
        let op = sample_op();
        let mut resigned = op.clone();
        resigned.signature = bytes!("01deadbeef");
        let entry_point = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");
        assert_eq!(op.hash(entry_point, 1), resigned.hash(entry_point, 1));
    }

    #[test]
    fn chain_bound_hash_differs_between_chains() {
        let op = sample_op();
        let entry_point = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");
        assert_ne!(op.hash(entry_point, 1), op.hash(entry_point, 8453));
    }

    #[test]
    fn chain_agnostic_hash_differs_from_chain_bound_hash() {
        let op = sample_op();
        let entry_point = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");
        assert_ne!(op.hash_without_chain_id(entry_point), op.hash(entry_point, 1));
    }

    #[test]
    fn sponsor_hash_ignores_authorization_bytes() {
        let sponsor = address!("3333333333333333333333333333333333333333");
        let entry_point = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");
        let mut a = sample_op();
        a.paymaster_and_data = encode_paymaster_and_data(sponsor, 1, 2, &[1u8; 65]);
        let mut b = sample_op();
        b.paymaster_and_data = encode_paymaster_and_data(sponsor, 1, 2, &[2u8; 65]);

        assert_eq!(a.sponsor_hash(entry_point, 1), b.sponsor_hash(entry_point, 1));
        assert_ne!(a.hash(entry_point, 1), b.hash(entry_point, 1));
    }

    #[test]
    fn should_deserialize_camel_case_json() {
        const TEST_PACKED_USER_OPERATION: &str = r#"
        {
            "sender": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            "nonce": "0x1",
            "initCode": "0x",
            "callData": "0xb61d27f6",
            "accountGasLimits": "0x000000000000000000000000001e8480000000000000000000000000002dc6c0",
            "preVerificationGas": "0x186a0",
            "gasFees": "0x0000000000000000000000003b9aca0000000000000000000000000077359400",
            "paymasterAndData": "0x",
            "signature": "0x00"
        }
        "#;

        let op: PackedUserOperation = serde_json::from_str(TEST_PACKED_USER_OPERATION).unwrap();
        assert_eq!(op.nonce, U256::from(1));
        assert_eq!(op.verification_gas_limit(), 0x1e8480);
        assert_eq!(op.call_gas_limit(), 0x2dc6c0);
        assert_eq!(op.max_priority_fee_per_gas(), 0x3b9aca00);
        assert_eq!(op.max_fee_per_gas(), 0x77359400);
        assert_eq!(op.selector(), Some([0xb6, 0x1d, 0x27, 0xf6]));
    }
}
