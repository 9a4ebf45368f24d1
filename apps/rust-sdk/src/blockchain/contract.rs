// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PrivateTransfer contract bindings.

use alloy::sol;

// Encrypted fields are `bytes32` ciphertext handles on the wire.
sol! {
    #[sol(rpc)]
    interface IPrivateTransfer {
        struct Withdrawal {
            bytes32 receiver;
            bytes32 amount;
        }

        struct Vault {
            bool isPublished;
            bytes32 transferType;
            bytes32 balance;
            bytes32 passwordAddress;
            bytes32 depositor;
            bytes32 allowAddress;
            Withdrawal[] withdrawal;
        }

        struct Task {
            uint256 password;
            uint256 amount;
        }

        error InsufficientBalance(uint256 balance, uint256 needed);

        function deposit(
            bytes32 password,
            bytes32 transferType,
            bytes32 passwordAddress,
            bytes32 allowAddress,
            bytes inputProof
        ) external payable;

        function withdraw(bytes32 password, bytes32 amount, bytes inputProof) external;
        function entrustWithdraw(bytes32 password, bytes inputProof) external;
        function refund(bytes32 password, bytes inputProof) external;
        function changeFee(uint256 fee) external;

        function getVault(uint256 password) external view returns (Vault memory vault);
        function getPasswords() external view returns (Task[] memory tasks);
        function fee() external view returns (uint256);
    }
}

#[cfg(test)]
mod tests {
    use super::IPrivateTransfer;
    use alloy::sol_types::SolCall;

    #[test]
    fn selectors_match_contract_abi() {
        assert_eq!(
            IPrivateTransfer::depositCall::SIGNATURE,
            "deposit(bytes32,bytes32,bytes32,bytes32,bytes)"
        );
        assert_eq!(
            IPrivateTransfer::withdrawCall::SIGNATURE,
            "withdraw(bytes32,bytes32,bytes)"
        );
        assert_eq!(
            IPrivateTransfer::entrustWithdrawCall::SIGNATURE,
            "entrustWithdraw(bytes32,bytes)"
        );
        assert_eq!(IPrivateTransfer::getVaultCall::SIGNATURE, "getVault(uint256)");
    }
}
