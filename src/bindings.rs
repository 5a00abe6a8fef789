//! Solidity ABI bindings for the BeachBar / Mixologist lending stack,
//! its YieldBox vault, the UniswapV2 pools used for price discovery,
//! and the mock tokens and oracle deployed by the fixture.
//!
//! Only the functions the fixture calls (or reads back in tests) are
//! declared; function selectors depend on the parameter lists here.

use alloy::sol;

sol! {
    #![sol(all_derives = true)]

    struct LiquidationQueueMeta {
        uint256 activationTime;
        uint256 minBidAmount;
        uint256 closeToMinBidAmount;
        uint256 defaultBidAmount;
        address feeCollector;
        address bidExecutionSwapper;
        address usdoSwapper;
    }

    /// Payload passed to `BeachBar.registerMixologist` and decoded by the
    /// clone's `init`.
    struct MixologistInitData {
        address beachBar;
        address asset;
        uint256 assetId;
        address collateral;
        uint256 collateralId;
        address oracle;
        address[] collateralSwapPath;
        address[] tapSwapPath;
        address lendingBorrowingModule;
        address liquidationModule;
        address setterModule;
    }

    interface IOracleMock {
        function set(uint256 rate) external;
        function rate() external view returns (uint256);
    }

    interface IERC20Mock {
        function freeMint(uint256 amount) external;
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }

    interface IYieldBox {
        event LogDeploy(address indexed masterContract, bytes data, address indexed cloneAddress);

        function registerAsset(uint8 tokenType, address contractAddress, address strategy, uint256 tokenId) external returns (uint256);
        function ids(uint8 tokenType, address contractAddress, address strategy, uint256 tokenId) external view returns (uint256);
        function toShare(uint256 assetId, uint256 amount, bool roundUp) external view returns (uint256);
        function toAmount(uint256 assetId, uint256 share, bool roundUp) external view returns (uint256);
        function depositAsset(uint256 assetId, address from, address to, uint256 amount, uint256 share) external returns (uint256 amountOut, uint256 shareOut);
        function balanceOf(address owner, uint256 assetId) external view returns (uint256);
        function setApprovalForAll(address operator, bool approved) external;
        function isApprovedForAll(address owner, address operator) external view returns (bool);
        function transfer(address from, address to, uint256 assetId, uint256 share) external;
        function deploy(address masterContract, bytes calldata data, bool useCreate2) external payable returns (address);
        function clonesOf(address masterContract, uint256 index) external view returns (address);
        function clonesOfCount(address masterContract) external view returns (uint256);
    }

    interface IBeachBar {
        event RegisterMixologist(address indexed location);

        function setSwapper(address swapper, bool enable) external;
        function swappers(address swapper) external view returns (bool);
        function registerMasterContract(address mc, uint8 contractType) external;
        function registerMixologist(address mc, bytes calldata data, bool useCreate2) external payable;
        function executeMixologistFn(address[] calldata mc, bytes[] memory data) external returns (bool[] memory success, bytes[] memory result);
        function setFeeTo(address feeTo_) external;
        function setFeeVeTap(address feeVeTap_) external;
        function setUsdoToken(address usdoToken_) external;
        function feeTo() external view returns (address);
        function feeVeTap() external view returns (address);
        function usdoToken() external view returns (address);
        function owner() external view returns (address);
    }

    interface IUniswapV2Factory {
        function createPair(address tokenA, address tokenB) external returns (address pair);
        function getPair(address tokenA, address tokenB) external view returns (address pair);
        function pairCodeHash() external pure returns (bytes32);
    }

    interface IUniswapV2Router02 {
        function addLiquidity(
            address tokenA,
            address tokenB,
            uint256 amountADesired,
            uint256 amountBDesired,
            uint256 amountAMin,
            uint256 amountBMin,
            address to,
            uint256 deadline
        ) external returns (uint256 amountA, uint256 amountB, uint256 liquidity);
    }

    interface IUniswapV2Pair {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }

    interface IMixologist {
        function init(bytes calldata data) external;
        function executeModule(bytes calldata data) external returns (bytes memory result);
        function addAsset(address from, address to, bool skim, uint256 share) external returns (uint256 fraction);
        function assetId() external view returns (uint256);
        function collateralId() external view returns (uint256);
        function userCollateralShare(address user) external view returns (uint256);
        function totalCollateralShare() external view returns (uint256);
        function balanceOf(address user) external view returns (uint256);
        function liquidationQueue() external view returns (address);
        function beachBar() external view returns (address);
    }

    interface IMixologistLendingBorrowing {
        function addCollateral(address from, address to, bool skim, uint256 share) external;
    }

    interface IMixologistSetter {
        function setLiquidationQueue(address liquidationQueue, LiquidationQueueMeta calldata liquidationQueueMeta) external;
    }

    interface ILiquidationQueue {
        function init(LiquidationQueueMeta calldata liquidationQueueMeta, address mixologist) external;
        function liquidationQueueMeta() external view returns (
            uint256 activationTime,
            uint256 minBidAmount,
            uint256 closeToMinBidAmount,
            uint256 defaultBidAmount,
            address feeCollector,
            address bidExecutionSwapper,
            address usdoSwapper
        );
        function mixologist() external view returns (address);
    }
}
