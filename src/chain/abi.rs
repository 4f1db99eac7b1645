//! Contract interfaces used by the client
//!
//! - ERC-20: `approve`, `balanceOf`, `decimals`, `allowance`
//! - X router: quotes, pair lookup, LP data, swap and LP subscription

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// Minimal ERC-20 surface
    #[derive(Debug)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
        function allowance(address owner, address spender) external view returns (uint256);
    }

    /// X router: swaps, liquidity and LP price views
    #[derive(Debug)]
    interface IXRouter {
        function exchangeEstimate(address tokenIn, address tokenOut, uint256 amountIn)
            external view returns (uint256 amountOut);

        function getPair(address tokenA, address tokenB) external view returns (address pair);

        function xexchange(
            address tokenIn,
            address tokenOut,
            uint256 amountIn,
            uint256 amountOutMin,
            uint256 deadline
        ) external payable returns (uint256 amountOut);

        function xLpSubscribe(address lp, uint256[2] amounts)
            external payable returns (uint256 liquidity);

        function getLpPrice(address lp) external view returns (uint256 price);
        function getLpPair(address lp) external view returns (address token0, address token1);
        function getLpReserve(address lp) external view returns (uint256 reserve0, uint256 reserve1);
    }
}

// ============================================
// CALLDATA BUILDERS (writes)
// ============================================

pub fn approve_calldata(spender: Address, amount: U256) -> Bytes {
    IERC20::approveCall { spender, amount }.abi_encode().into()
}

pub fn xexchange_calldata(
    token_in: Address,
    token_out: Address,
    amount_in: U256,
    amount_out_min: U256,
    deadline: U256,
) -> Bytes {
    IXRouter::xexchangeCall {
        tokenIn: token_in,
        tokenOut: token_out,
        amountIn: amount_in,
        amountOutMin: amount_out_min,
        deadline,
    }
    .abi_encode()
    .into()
}

pub fn lp_subscribe_calldata(lp: Address, amount_a: U256, amount_b: U256) -> Bytes {
    IXRouter::xLpSubscribeCall { lp, amounts: [amount_a, amount_b] }
        .abi_encode()
        .into()
}
