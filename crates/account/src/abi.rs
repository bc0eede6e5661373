//! Solidity-facing ABI of the account.
use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Execution {
        address target;
        uint256 value;
        bytes callData;
    }

    interface ISmartAccount {
        function execute(bytes32 mode, bytes calldata executionCalldata) external payable;
        function executeFromExecutor(bytes32 mode, bytes calldata executionCalldata)
            external
            payable
            returns (bytes[] memory returnData);
        function executeWithoutChainIdValidation(bytes[] calldata calls) external payable;

        function addOwnerAddress(address owner) external;
        function addOwnerPublicKey(bytes32 x, bytes32 y) external;
        function removeOwnerAtIndex(uint256 index, bytes calldata owner) external;
        function removeLastOwner(uint256 index, bytes calldata owner) external;
        function isOwnerAddress(address account) external view returns (bool);
        function isOwnerBytes(bytes calldata account) external view returns (bool);
        function ownerAtIndex(uint256 index) external view returns (bytes memory);
        function nextOwnerIndex() external view returns (uint256);
        function ownerCount() external view returns (uint256);

        function installModule(uint256 moduleTypeId, address module, bytes calldata initData)
            external
            payable;
        function uninstallModule(uint256 moduleTypeId, address module, bytes calldata deInitData)
            external
            payable;
        function isModuleInstalled(
            uint256 moduleTypeId,
            address module,
            bytes calldata additionalContext
        ) external view returns (bool);

        function isValidSignature(bytes32 hash, bytes calldata signature)
            external
            view
            returns (bytes4);
    }
}

pub use ISmartAccount::ISmartAccountCalls;
