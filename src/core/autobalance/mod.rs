mod team_balancer;

pub use team_balancer::{
    balance_teams, BalancePlayer, SplitRegistry, Team, TeamSplit, PLACEHOLDER_MMR,
};
