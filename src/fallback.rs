// Offline move selection for rounds the oracle could not decide.
use rand::Rng;

use crate::character::{Combatant, Move, MoveDecision, Moveset, RoundState};

// Damage above which a combatant considers recovering.
pub const HEAVY_DAMAGE: u64 = 60;
pub const RECOVER_CHANCE: f64 = 0.4;

pub fn choose_moves(round: &RoundState) -> MoveDecision {
    let mut rng = rand::rng();
    let [first, second] = &round.combatants;
    MoveDecision {
        moves: [
            (first.id.clone(), choose_move(first, &round.moveset, &mut rng)),
            (second.id.clone(), choose_move(second, &round.moveset, &mut rng)),
        ],
    }
}

pub fn choose_move(combatant: &Combatant, moveset: &Moveset, rng: &mut impl Rng) -> String {
    let recover = moveset.resolve(&Move::Recover.to_string());
    if let Some(recover) = recover {
        if combatant.total_damage_received > HEAVY_DAMAGE && rng.random_bool(RECOVER_CHANCE) {
            return recover.to_string();
        }
    }
    let moves = moveset.as_slice();
    moves[rng.random_range(0..moves.len())].clone()
}
