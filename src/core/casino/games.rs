// Pure game rules. Each function takes the RNG as a parameter so tests can
// replay a fixed seed, and returns the net coin change for the player
// (positive = won, negative = lost, 0 = refund).

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SLOTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSymbol {
    Cherry,
    Lemon,
    Clover,
    Diamond,
    Seven,
}

impl SlotSymbol {
    pub const ALL: [SlotSymbol; 5] = [
        SlotSymbol::Cherry,
        SlotSymbol::Lemon,
        SlotSymbol::Clover,
        SlotSymbol::Diamond,
        SlotSymbol::Seven,
    ];

    /// Relative reel weights (sum 100).
    pub fn weight(self) -> u32 {
        match self {
            SlotSymbol::Cherry => 50,
            SlotSymbol::Lemon => 25,
            SlotSymbol::Clover => 15,
            SlotSymbol::Diamond => 8,
            SlotSymbol::Seven => 2,
        }
    }

    /// Total return (stake included) for three of a kind.
    pub fn triple_multiplier(self) -> f64 {
        match self {
            SlotSymbol::Cherry => 1.5,
            SlotSymbol::Lemon => 2.5,
            SlotSymbol::Clover => 5.0,
            SlotSymbol::Diamond => 12.0,
            SlotSymbol::Seven => 30.0,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            SlotSymbol::Cherry => "🍒",
            SlotSymbol::Lemon => "🍋",
            SlotSymbol::Clover => "🍀",
            SlotSymbol::Diamond => "💎",
            SlotSymbol::Seven => "7️⃣",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotsResult {
    Triple(SlotSymbol),
    Pair(SlotSymbol),
    Miss,
}

pub fn spin_reels<R: Rng + ?Sized>(rng: &mut R) -> [SlotSymbol; 3] {
    // The weights are constant and non-zero, so this can't fail; fall back to
    // uniform reels rather than panicking if it ever did.
    match WeightedIndex::new(SlotSymbol::ALL.iter().map(|s| s.weight())) {
        Ok(dist) => [
            SlotSymbol::ALL[dist.sample(rng)],
            SlotSymbol::ALL[dist.sample(rng)],
            SlotSymbol::ALL[dist.sample(rng)],
        ],
        Err(_) => [
            SlotSymbol::ALL[rng.gen_range(0..5)],
            SlotSymbol::ALL[rng.gen_range(0..5)],
            SlotSymbol::ALL[rng.gen_range(0..5)],
        ],
    }
}

pub fn evaluate_reels(reels: &[SlotSymbol; 3]) -> SlotsResult {
    let [a, b, c] = *reels;
    if a == b && b == c {
        SlotsResult::Triple(a)
    } else if a == b || a == c {
        SlotsResult::Pair(a)
    } else if b == c {
        SlotsResult::Pair(b)
    } else {
        SlotsResult::Miss
    }
}

pub fn slots_net(result: SlotsResult, bet: i64) -> i64 {
    match result {
        SlotsResult::Triple(symbol) => (bet as f64 * (symbol.triple_multiplier() - 1.0)).floor() as i64,
        SlotsResult::Pair(_) => 0,
        SlotsResult::Miss => -bet,
    }
}

// ============================================================================
// COINFLIP
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinSide {
    Heads,
    Tails,
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CoinSide::Heads => "heads",
            CoinSide::Tails => "tails",
        })
    }
}

pub fn flip_coin<R: Rng + ?Sized>(rng: &mut R) -> CoinSide {
    if rng.gen_bool(0.5) {
        CoinSide::Heads
    } else {
        CoinSide::Tails
    }
}

pub fn coinflip_net(call: CoinSide, landed: CoinSide, bet: i64) -> i64 {
    if call == landed {
        bet
    } else {
        -bet
    }
}

// ============================================================================
// ROULETTE (European, single zero)
// ============================================================================

pub const RED_POCKETS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PocketColor {
    Red,
    Black,
    Green,
}

impl fmt::Display for PocketColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PocketColor::Red => "red",
            PocketColor::Black => "black",
            PocketColor::Green => "green",
        };
        f.write_str(name)
    }
}

pub fn pocket_color(pocket: u8) -> PocketColor {
    if pocket == 0 {
        PocketColor::Green
    } else if RED_POCKETS.contains(&pocket) {
        PocketColor::Red
    } else {
        PocketColor::Black
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouletteGuess {
    Number(u8),
    Color(PocketColor),
}

impl FromStr for RouletteGuess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let guess = s.trim().to_lowercase();
        match guess.as_str() {
            "red" => Ok(RouletteGuess::Color(PocketColor::Red)),
            "black" => Ok(RouletteGuess::Color(PocketColor::Black)),
            "green" => Ok(RouletteGuess::Color(PocketColor::Green)),
            other => match other.parse::<u8>() {
                Ok(n) if n <= 36 => Ok(RouletteGuess::Number(n)),
                _ => Err(format!(
                    "`{}` is not a number from 0 to 36 or red/black/green",
                    s.trim()
                )),
            },
        }
    }
}

pub fn spin_wheel<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(0..=36)
}

/// Numbers pay 35 to 1, colours (green included) pay 1 to 1.
pub fn roulette_net(guess: RouletteGuess, pocket: u8, bet: i64) -> i64 {
    match guess {
        RouletteGuess::Number(n) if n == pocket => bet * 35,
        RouletteGuess::Color(color) if color == pocket_color(pocket) => bet,
        _ => -bet,
    }
}

// ============================================================================
// DICE DUEL
// ============================================================================

pub fn roll_die<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.gen_range(1..=6)
}

/// Net change for (challenger, opponent). The higher roll takes the other's
/// stake; a tie refunds both.
pub fn duel_nets(challenger_roll: u8, opponent_roll: u8, bet: i64) -> (i64, i64) {
    match challenger_roll.cmp(&opponent_roll) {
        std::cmp::Ordering::Greater => (bet, -bet),
        std::cmp::Ordering::Less => (-bet, bet),
        std::cmp::Ordering::Equal => (0, 0),
    }
}

// ============================================================================
// ROCK PAPER SCISSORS
// ============================================================================

pub const RPS_WIN_REWARD: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpsChoice {
    Rock,
    Paper,
    Scissors,
}

impl RpsChoice {
    pub const ALL: [RpsChoice; 3] = [RpsChoice::Rock, RpsChoice::Paper, RpsChoice::Scissors];

    pub fn emoji(self) -> &'static str {
        match self {
            RpsChoice::Rock => "✊",
            RpsChoice::Paper => "🖐️",
            RpsChoice::Scissors => "✌️",
        }
    }

    fn beats(self, other: RpsChoice) -> bool {
        matches!(
            (self, other),
            (RpsChoice::Rock, RpsChoice::Scissors)
                | (RpsChoice::Scissors, RpsChoice::Paper)
                | (RpsChoice::Paper, RpsChoice::Rock)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpsResult {
    Win,
    Draw,
    Loss,
}

pub fn rps_result(player: RpsChoice, bot: RpsChoice) -> RpsResult {
    if player == bot {
        RpsResult::Draw
    } else if player.beats(bot) {
        RpsResult::Win
    } else {
        RpsResult::Loss
    }
}
