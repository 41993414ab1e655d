//! Centralized Contract Definitions
//!
//! Minimal ABI surface for every on-chain interface the bot touches,
//! generated with ethers-rs `abigen!`. Only the functions we actually
//! call are declared.
//!
//! Author: AI-Generated
//! Created: 2026-08-23

use ethers::prelude::abigen;

// ── Uniswap V2 family ────────────────────────────────────────────────

abigen!(
    IUniswapV2Factory,
    r#"[
        function getPair(address tokenA, address tokenB) external view returns (address pair)
    ]"#
);

abigen!(
    IUniswapV2Pair,
    r#"[
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast)
        function token0() external view returns (address)
        function token1() external view returns (address)
    ]"#
);

abigen!(
    IUniswapV2Router02,
    r#"[
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts)
    ]"#
);

// ── Concentrated liquidity (Ambient/CrocSwap query contract) ─────────

abigen!(
    ICrocQuery,
    r#"[
        function queryPrice(address base, address quote, uint256 poolIdx) external view returns (uint128)
    ]"#
);

// ── Chainlink price feed ─────────────────────────────────────────────

abigen!(
    IChainlinkAggregator,
    r#"[
        function decimals() external view returns (uint8)
        function latestRoundData() external view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)
    ]"#
);

// ── Flashloan arbitrage contract ─────────────────────────────────────

abigen!(
    IFlashloanArbitrage,
    r#"[
        struct ArbitrageParams { address tokenBorrow; uint256 amount; address tokenTarget; address buyRouter; address sellRouter; uint256 minProfit; uint256 deadline; uint256 slippageBps }
        function executeArbitrage(ArbitrageParams calldata params) external returns (uint256 profit)
        function simulateArbitrage(ArbitrageParams calldata params) external view returns (uint256 expectedProfit)
    ]"#
);
