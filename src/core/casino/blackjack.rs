// Blackjack as a small state machine. The Discord layer owns one game per
// command invocation and forwards button presses as actions; the game only
// tracks cards and stakes and never touches balances.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Ace,
    Number(u8),
    Jack,
    Queen,
    King,
}

impl Rank {
    fn all() -> Vec<Rank> {
        let mut ranks = vec![Rank::Ace];
        ranks.extend((2..=10).map(Rank::Number));
        ranks.extend([Rank::Jack, Rank::Queen, Rank::King]);
        ranks
    }

    fn points(self) -> u32 {
        match self {
            Rank::Ace => 11,
            Rank::Number(n) => u32::from(n),
            Rank::Jack | Rank::Queen | Rank::King => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rank {
            Rank::Ace => write!(f, "A")?,
            Rank::Number(n) => write!(f, "{n}")?,
            Rank::Jack => write!(f, "J")?,
            Rank::Queen => write!(f, "Q")?,
            Rank::King => write!(f, "K")?,
        }
        let suit = match self.suit {
            Suit::Spades => "♠️",
            Suit::Hearts => "♥️",
            Suit::Diamonds => "♦️",
            Suit::Clubs => "♣️",
        };
        f.write_str(suit)
    }
}

/// Aces count 11 and drop to 1 one at a time while the hand is over 21.
pub fn hand_value(cards: &[Card]) -> u32 {
    let mut total: u32 = cards.iter().map(|c| c.rank.points()).sum();
    let mut aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();
    while total > 21 && aces > 0 {
        total -= 10;
        aces -= 1;
    }
    total
}

pub fn render_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn fresh_deck() -> Vec<Card> {
    let suits = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];
    Rank::all()
        .into_iter()
        .flat_map(|rank| suits.iter().map(move |&suit| Card::new(rank, suit)))
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlackjackError {
    #[error("The hand is already over")]
    Finished,

    #[error("You can only double down on your first two cards")]
    CannotDouble,

    #[error("You can only split two cards of the same rank, once")]
    CannotSplit,

    #[error("The deck ran out of cards")]
    DeckExhausted,
}

#[derive(Debug, Clone)]
pub struct Hand {
    pub cards: Vec<Card>,
    pub stake: i64,
    pub doubled: bool,
}

impl Hand {
    pub fn value(&self) -> u32 {
        hand_value(&self.cards)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandResult {
    Natural,
    Bust,
    Win,
    Lose,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandOutcome {
    pub result: HandResult,
    pub net: i64,
}

pub struct BlackjackGame {
    deck: Vec<Card>,
    hands: Vec<Hand>,
    dealer: Vec<Card>,
    current: usize,
    finished: bool,
    natural: bool,
}

impl BlackjackGame {
    /// Shuffle a fresh deck and deal.
    pub fn deal<R: Rng + ?Sized>(bet: i64, rng: &mut R) -> Result<Self, BlackjackError> {
        let mut deck = fresh_deck();
        deck.shuffle(rng);
        Self::from_deck(bet, deck)
    }

    /// Deal from a prepared deck. Cards are drawn from the end.
    pub fn from_deck(bet: i64, deck: Vec<Card>) -> Result<Self, BlackjackError> {
        let mut game = Self {
            deck,
            hands: Vec::new(),
            dealer: Vec::new(),
            current: 0,
            finished: false,
            natural: false,
        };

        let first = game.draw()?;
        let second = game.draw()?;
        game.hands.push(Hand {
            cards: vec![first, second],
            stake: bet,
            doubled: false,
        });
        game.dealer = vec![game.draw()?, game.draw()?];

        if hand_value(&game.hands[0].cards) == 21 {
            game.natural = true;
            game.play_dealer()?;
        }

        Ok(game)
    }

    fn draw(&mut self) -> Result<Card, BlackjackError> {
        self.deck.pop().ok_or(BlackjackError::DeckExhausted)
    }

    fn ensure_active(&self) -> Result<(), BlackjackError> {
        if self.finished {
            Err(BlackjackError::Finished)
        } else {
            Ok(())
        }
    }

    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }

    pub fn dealer(&self) -> &[Card] {
        &self.dealer
    }

    pub fn current_hand(&self) -> usize {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_natural(&self) -> bool {
        self.natural
    }

    /// Sum of all stakes currently riding on the table.
    pub fn committed_stake(&self) -> i64 {
        self.hands.iter().map(|h| h.stake).sum()
    }

    pub fn can_double(&self) -> bool {
        !self.finished && self.hands[self.current].cards.len() == 2
    }

    pub fn can_split(&self) -> bool {
        !self.finished
            && self.hands.len() == 1
            && self.hands[0].cards.len() == 2
            && self.hands[0].cards[0].rank == self.hands[0].cards[1].rank
    }

    /// Extra stake a double down on the current hand would commit.
    pub fn double_cost(&self) -> i64 {
        self.hands[self.current].stake
    }

    /// Extra stake a split would commit.
    pub fn split_cost(&self) -> i64 {
        self.hands[0].stake
    }

    pub fn hit(&mut self) -> Result<(), BlackjackError> {
        self.ensure_active()?;
        let card = self.draw()?;
        self.hands[self.current].cards.push(card);
        if self.hands[self.current].value() >= 21 {
            self.stand()?;
        }
        Ok(())
    }

    /// Finish the current hand: move to the next split hand or let the
    /// dealer play.
    pub fn stand(&mut self) -> Result<(), BlackjackError> {
        self.ensure_active()?;
        if self.current + 1 < self.hands.len() {
            self.current += 1;
            return Ok(());
        }
        self.play_dealer()
    }

    /// Double the stake, take exactly one card, then stand.
    pub fn double_down(&mut self) -> Result<(), BlackjackError> {
        if !self.can_double() {
            return Err(BlackjackError::CannotDouble);
        }
        let card = self.draw()?;
        let hand = &mut self.hands[self.current];
        hand.stake *= 2;
        hand.doubled = true;
        hand.cards.push(card);
        self.stand()
    }

    pub fn split(&mut self) -> Result<(), BlackjackError> {
        if !self.can_split() {
            return Err(BlackjackError::CannotSplit);
        }
        let stake = self.hands[0].stake;
        let first = self.hands[0].cards[0];
        let second = self.hands[0].cards[1];
        let first_hand = vec![first, self.draw()?];
        let second_hand = vec![second, self.draw()?];

        self.hands = vec![
            Hand {
                cards: first_hand,
                stake,
                doubled: false,
            },
            Hand {
                cards: second_hand,
                stake,
                doubled: false,
            },
        ];
        self.current = 0;
        Ok(())
    }

    fn play_dealer(&mut self) -> Result<(), BlackjackError> {
        while hand_value(&self.dealer) < 17 {
            let card = self.draw()?;
            self.dealer.push(card);
        }
        self.finished = true;
        Ok(())
    }

    /// Per-hand results. Only meaningful once the game is finished.
    pub fn outcomes(&self) -> Vec<HandOutcome> {
        if self.natural {
            return vec![HandOutcome {
                result: HandResult::Natural,
                net: self.hands[0].stake,
            }];
        }

        let dealer = hand_value(&self.dealer);
        self.hands
            .iter()
            .map(|hand| {
                let value = hand.value();
                let (result, net) = if value > 21 {
                    (HandResult::Bust, -hand.stake)
                } else if dealer > 21 || value > dealer {
                    (HandResult::Win, hand.stake)
                } else if value < dealer {
                    (HandResult::Lose, -hand.stake)
                } else {
                    (HandResult::Push, 0)
                };
                HandOutcome { result, net }
            })
            .collect()
    }

    pub fn net(&self) -> i64 {
        self.outcomes().iter().map(|o| o.net).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn c(rank: Rank) -> Card {
        Card::new(rank, Suit::Spades)
    }

    /// Build a deck so that `draws` come out in order.
    fn stacked(draws: &[Rank]) -> Vec<Card> {
        draws.iter().rev().map(|&r| c(r)).collect()
    }

    #[test]
    fn aces_soften_one_at_a_time() {
        assert_eq!(hand_value(&[c(Rank::Ace), c(Rank::King)]), 21);
        assert_eq!(hand_value(&[c(Rank::Ace), c(Rank::Ace)]), 12);
        assert_eq!(
            hand_value(&[c(Rank::Ace), c(Rank::Ace), c(Rank::Number(9))]),
            21
        );
        assert_eq!(
            hand_value(&[c(Rank::King), c(Rank::Queen), c(Rank::Ace)]),
            21
        );
    }

    #[test]
    fn fresh_deck_has_52_unique_cards() {
        let deck = fresh_deck();
        assert_eq!(deck.len(), 52);
        for (i, a) in deck.iter().enumerate() {
            assert!(!deck[i + 1..].contains(a));
        }
    }

    #[test]
    fn natural_pays_even_money_immediately() {
        use Rank::*;
        let game = BlackjackGame::from_deck(
            40,
            stacked(&[Ace, King, Number(10), Number(6), Number(5)]),
        )
        .unwrap();

        assert!(game.is_finished());
        assert!(game.is_natural());
        assert_eq!(hand_value(game.dealer()), 21);
        assert_eq!(game.net(), 40);
    }

    #[test]
    fn stand_lets_dealer_draw_to_seventeen() {
        use Rank::*;
        let mut game = BlackjackGame::from_deck(
            10,
            stacked(&[King, Number(9), Number(10), Number(4), Number(2), Number(5)]),
        )
        .unwrap();

        game.stand().unwrap();
        // dealer: 10 + 4 + 2 + 5 = 21
        assert_eq!(hand_value(game.dealer()), 21);
        assert_eq!(game.outcomes()[0].result, HandResult::Lose);
        assert_eq!(game.net(), -10);
        assert_eq!(game.hit(), Err(BlackjackError::Finished));
    }

    #[test]
    fn hitting_to_bust_ends_the_hand() {
        use Rank::*;
        let mut game = BlackjackGame::from_deck(
            10,
            stacked(&[King, Number(6), Number(10), Number(7), Queen]),
        )
        .unwrap();

        game.hit().unwrap();
        assert!(game.is_finished());
        assert_eq!(game.outcomes()[0].result, HandResult::Bust);
        assert_eq!(game.net(), -10);
    }

    #[test]
    fn double_down_doubles_stake_and_stands() {
        use Rank::*;
        let mut game = BlackjackGame::from_deck(
            25,
            stacked(&[Number(6), Number(5), Number(10), Number(7), King]),
        )
        .unwrap();

        assert!(game.can_double());
        assert_eq!(game.double_cost(), 25);
        game.double_down().unwrap();

        assert!(game.is_finished());
        assert_eq!(game.hands()[0].stake, 50);
        assert_eq!(game.hands()[0].value(), 21);
        assert_eq!(game.net(), 50);
    }

    #[test]
    fn split_plays_two_hands_in_order() {
        use Rank::*;
        let mut game = BlackjackGame::from_deck(
            10,
            stacked(&[
                Number(8),
                Number(8),
                Number(10),
                Number(8),
                Number(3),  // first hand: 8 + 3
                Number(10), // second hand: 8 + 10
                Number(9),  // first hand hit -> 20
            ]),
        )
        .unwrap();

        assert!(game.can_split());
        assert_eq!(game.split_cost(), 10);
        game.split().unwrap();
        assert!(!game.can_split());
        assert_eq!(game.committed_stake(), 20);

        game.hit().unwrap();
        assert_eq!(game.current_hand(), 0);
        game.stand().unwrap();
        assert_eq!(game.current_hand(), 1);
        game.stand().unwrap();

        // dealer 10 + 8 = 18: first hand 20 wins, second hand 18 pushes
        let outcomes = game.outcomes();
        assert_eq!(outcomes[0].result, HandResult::Win);
        assert_eq!(outcomes[1].result, HandResult::Push);
        assert_eq!(game.net(), 10);
    }

    #[test]
    fn split_requires_matching_ranks() {
        use Rank::*;
        let mut game = BlackjackGame::from_deck(
            10,
            stacked(&[Number(10), King, Number(10), Number(8)]),
        )
        .unwrap();
        assert_eq!(game.split(), Err(BlackjackError::CannotSplit));
    }

    #[test]
    fn seeded_deal_is_reproducible() {
        let a = BlackjackGame::deal(10, &mut StdRng::seed_from_u64(99)).unwrap();
        let b = BlackjackGame::deal(10, &mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(a.hands()[0].cards, b.hands()[0].cards);
        assert_eq!(a.dealer(), b.dealer());
    }
}
