//! Ships, their destructible part trees and passive abilities

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Armor scaling constant in `1 − armor / (armor + ARMOR_CONSTANT)`
pub const ARMOR_CONSTANT: f32 = 400.0;
/// Flat reduction from the damage-resistance passive
pub const DAMAGE_RESISTANCE_FRACTION: f32 = 0.15;
pub const ADAPTIVE_ARMOR_STEP: f32 = 15.0;
pub const ADAPTIVE_ARMOR_CAP: f32 = 120.0;
pub const ADAPTIVE_DAMAGE_STEP: f32 = 0.05;
pub const ADAPTIVE_DAMAGE_CAP: f32 = 0.5;
/// Health per second while regeneration runs
pub const REGENERATION_PER_SEC: f32 = 2.0;
pub const DAMAGE_RAMP_PER_SEC: f32 = 0.02;
pub const DAMAGE_RAMP_CAP: f32 = 0.3;

/// One of the two players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

/// Gameplay classification of a ship part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartTag {
    /// Structural filler; hits resolve to the nearest tagged ancestor
    Hull,
    Wing,
    Engine,
    Fin,
    Weapon,
    Plasma,
    Core,
    Tail,
}

impl PartTag {
    pub fn is_tagged(self) -> bool {
        self != Self::Hull
    }

    pub fn damage_multiplier(self) -> f32 {
        match self {
            Self::Wing => 0.85,
            Self::Weapon => 0.90,
            Self::Plasma => 1.10,
            Self::Engine => 1.15,
            Self::Core => 1.30,
            Self::Hull | Self::Fin | Self::Tail => 1.0,
        }
    }
}

/// A destructible sub-component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipPart {
    pub tag: PartTag,
    pub parent: Option<usize>,
    /// Offset from the ship position while attached
    pub offset: Vec2,
    pub radius: f32,
    pub detached: bool,
    /// World position once detached
    pub loose_position: Vec2,
    pub drift: Vec2,
    pub rotation: f32,
    pub spin: f32,
}

impl ShipPart {
    fn new(tag: PartTag, parent: Option<usize>, offset: Vec2, radius: f32) -> Self {
        Self {
            tag,
            parent,
            offset,
            radius,
            detached: false,
            loose_position: Vec2::ZERO,
            drift: Vec2::ZERO,
            rotation: 0.0,
            spin: 0.0,
        }
    }
}

/// The default part tree: core at the root, everything else hangs off it
pub fn default_blueprint() -> Vec<ShipPart> {
    vec![
        ShipPart::new(PartTag::Core, None, Vec2::ZERO, 0.9),
        ShipPart::new(PartTag::Hull, Some(0), Vec2::new(0.0, 0.6), 0.8),
        ShipPart::new(PartTag::Wing, Some(1), Vec2::new(-1.4, 0.4), 0.6),
        ShipPart::new(PartTag::Wing, Some(1), Vec2::new(1.4, 0.4), 0.6),
        ShipPart::new(PartTag::Weapon, Some(1), Vec2::new(0.0, 1.5), 0.5),
        ShipPart::new(PartTag::Plasma, Some(4), Vec2::new(0.0, 2.1), 0.3),
        ShipPart::new(PartTag::Engine, Some(0), Vec2::new(0.0, -1.0), 0.6),
        ShipPart::new(PartTag::Tail, Some(6), Vec2::new(0.0, -1.7), 0.4),
        ShipPart::new(PartTag::Fin, Some(7), Vec2::new(0.6, -2.0), 0.3),
    ]
}

/// Persistent ship modifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Passives {
    pub lifesteal: bool,
    pub critical_immunity: bool,
    pub critical_enhancement: bool,
    pub adaptive_armor: bool,
    pub adaptive_damage: bool,
    /// Removes the damage roll spread
    pub precision: bool,
    pub damage_resistance: bool,
    pub last_chance: bool,
    pub high_speed_offense: bool,
    pub high_speed_defense: bool,
    pub collision_avoidance: bool,
    pub regeneration: bool,
    pub damage_ramp: bool,
    pub move_extension: bool,
    /// Full-length trajectory preview
    pub precision_preview: bool,
}

/// Starting stats for a ship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipLoadout {
    pub max_health: f32,
    pub armor: f32,
    pub damage_multiplier: f32,
    pub passives: Passives,
}

impl Default for ShipLoadout {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            armor: 50.0,
            damage_multiplier: 1.0,
            passives: Passives::default(),
        }
    }
}

/// Result of `Ship::take_damage`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamageReport {
    /// Health actually removed
    pub applied: f32,
    pub health_after: f32,
    pub last_chance_triggered: bool,
    /// True only on the hit that destroyed the ship
    pub destroyed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ship {
    pub slot: PlayerSlot,
    pub position: Vec2,
    pub knockback: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub armor: f32,
    pub damage_multiplier: f32,
    pub passives: Passives,
    pub moves_remaining: u32,
    pub parts: Vec<ShipPart>,
    destroyed: bool,
    last_chance_used: bool,
    pub adaptive_armor_bonus: f32,
    pub adaptive_damage_bonus: f32,
    pub ramp_bonus: f32,
    /// Regeneration / damage ramp run only while this is set
    pub overtime_active: bool,
    /// Set by move extension: the next move does not end the turn
    pub skip_end_turn: bool,
    move_extension_used: bool,
}

impl Ship {
    pub fn new(slot: PlayerSlot, position: Vec2, loadout: &ShipLoadout, moves: u32) -> Self {
        Self {
            slot,
            position,
            knockback: Vec2::ZERO,
            health: loadout.max_health,
            max_health: loadout.max_health,
            armor: loadout.armor,
            damage_multiplier: loadout.damage_multiplier,
            passives: loadout.passives,
            moves_remaining: moves,
            parts: default_blueprint(),
            destroyed: false,
            last_chance_used: false,
            adaptive_armor_bonus: 0.0,
            adaptive_damage_bonus: 0.0,
            ramp_bonus: 0.0,
            overtime_active: false,
            skip_end_turn: false,
            move_extension_used: false,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn last_chance_used(&self) -> bool {
        self.last_chance_used
    }

    /// Damage multiplier including adaptive and ramp bonuses
    pub fn effective_damage_multiplier(&self) -> f32 {
        self.damage_multiplier + self.adaptive_damage_bonus + self.ramp_bonus
    }

    pub fn effective_armor(&self) -> f32 {
        self.armor + self.adaptive_armor_bonus
    }

    pub fn part_position(&self, index: usize) -> Vec2 {
        let part = &self.parts[index];
        if part.detached {
            part.loose_position
        } else {
            self.position + part.offset
        }
    }

    /// Walk up from `contact` to the nearest tagged ancestor, or `contact`
    /// itself when nothing above it is tagged.
    pub fn resolve_tagged_part(&self, contact: usize) -> usize {
        let mut cursor = Some(contact);
        while let Some(index) = cursor {
            let part = &self.parts[index];
            if part.tag.is_tagged() {
                return index;
            }
            cursor = part.parent;
        }
        contact
    }

    /// Apply raw damage after armor and resistance.
    pub fn take_damage(&mut self, raw_damage: f32, point: Vec2) -> DamageReport {
        if self.destroyed {
            warn!(ship = ?self.slot, "Damage ignored: ship already destroyed");
            return DamageReport {
                health_after: self.health,
                ..DamageReport::default()
            };
        }

        let armor = self.effective_armor().max(0.0);
        let mut effective = raw_damage.max(0.0) * (1.0 - armor / (armor + ARMOR_CONSTANT));
        if self.passives.damage_resistance {
            effective *= 1.0 - DAMAGE_RESISTANCE_FRACTION;
        }

        let before = self.health;
        let mut report = DamageReport::default();

        if before - effective <= 0.0 {
            if self.passives.last_chance && !self.last_chance_used {
                self.last_chance_used = true;
                self.health = 1.0_f32.min(self.max_health);
                report.last_chance_triggered = true;
                info!(ship = ?self.slot, x = point.x, y = point.y, "Last chance saved ship");
            } else {
                self.health = 0.0;
                self.destroyed = true;
                report.destroyed = true;
                info!(ship = ?self.slot, x = point.x, y = point.y, "Ship destroyed");
            }
        } else {
            self.health = (before - effective).clamp(0.0, self.max_health);
        }

        report.applied = (before - self.health).max(0.0);
        report.health_after = self.health;
        report
    }

    /// Heal up to max health, returning the amount restored
    pub fn heal(&mut self, amount: f32) -> f32 {
        if self.destroyed {
            return 0.0;
        }
        let before = self.health;
        self.health = (self.health + amount.max(0.0)).clamp(0.0, self.max_health);
        self.health - before
    }

    /// Adaptive armor hardens after each hit taken
    pub fn record_hit_taken(&mut self) {
        if self.passives.adaptive_armor {
            self.adaptive_armor_bonus =
                (self.adaptive_armor_bonus + ADAPTIVE_ARMOR_STEP).min(ADAPTIVE_ARMOR_CAP);
        }
    }

    /// Adaptive damage grows after each hit dealt
    pub fn record_hit_dealt(&mut self) {
        if self.passives.adaptive_damage {
            self.adaptive_damage_bonus =
                (self.adaptive_damage_bonus + ADAPTIVE_DAMAGE_STEP).min(ADAPTIVE_DAMAGE_CAP);
        }
    }

    pub fn children_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.parts
            .iter()
            .enumerate()
            .filter(move |(_, p)| p.parent == Some(index))
            .map(|(i, _)| i)
    }

    /// Detach `index` and its subtree. The core never detaches; a subtree
    /// below the core still does. Returns the parts that came loose.
    pub fn detach<R: Rng>(
        &mut self,
        index: usize,
        impact_point: Vec2,
        impact_speed: f32,
        impulse_scale: f32,
        max_torque: f32,
        rng: &mut R,
    ) -> Vec<usize> {
        let mut loose = Vec::new();
        let mut stack = vec![index];

        while let Some(current) = stack.pop() {
            stack.extend(self.children_of(current));

            let position = self.part_position(current);
            let part = &mut self.parts[current];
            if part.detached || part.tag == PartTag::Core {
                continue;
            }

            let outward = (position - impact_point).try_normalize().unwrap_or(Vec2::Y);
            part.detached = true;
            part.loose_position = position;
            part.drift = self.knockback + outward * impact_speed * impulse_scale;
            part.spin = if max_torque > 0.0 {
                rng.gen_range(-max_torque..=max_torque)
            } else {
                0.0
            };
            loose.push(current);
        }

        loose
    }

    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.knockback += impulse;
    }

    /// Integrate knockback and loose parts for one tick
    pub fn tick_motion(&mut self, dt: f32, damping: f32) {
        self.position += self.knockback * dt;
        self.knockback *= (-damping * dt).exp();
        if self.knockback.length_squared() < 1e-6 {
            self.knockback = Vec2::ZERO;
        }

        for part in self.parts.iter_mut().filter(|p| p.detached) {
            part.loose_position += part.drift * dt;
            part.rotation += part.spin * dt;
        }
    }

    /// Regeneration and damage ramp, only while over-time effects run
    pub fn tick_overtime(&mut self, dt: f32) {
        if !self.overtime_active || self.destroyed {
            return;
        }
        if self.passives.regeneration {
            self.heal(REGENERATION_PER_SEC * dt);
        }
        if self.passives.damage_ramp {
            self.ramp_bonus = (self.ramp_bonus + DAMAGE_RAMP_PER_SEC * dt).min(DAMAGE_RAMP_CAP);
        }
    }

    /// Arm the skip-end-turn flag; once per round, move extension only
    pub fn arm_move_extension(&mut self) -> bool {
        if !self.passives.move_extension || self.move_extension_used {
            return false;
        }
        self.move_extension_used = true;
        self.skip_end_turn = true;
        true
    }

    /// Restore the ship for a fresh round at `position`
    pub fn reset_for_round(&mut self, position: Vec2, moves: u32) {
        self.position = position;
        self.knockback = Vec2::ZERO;
        self.health = self.max_health;
        self.moves_remaining = moves;
        self.parts = default_blueprint();
        self.destroyed = false;
        self.last_chance_used = false;
        self.adaptive_armor_bonus = 0.0;
        self.adaptive_damage_bonus = 0.0;
        self.ramp_bonus = 0.0;
        self.overtime_active = false;
        self.skip_end_turn = false;
        self.move_extension_used = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ship_with(passives: Passives, armor: f32) -> Ship {
        let loadout = ShipLoadout {
            armor,
            passives,
            ..ShipLoadout::default()
        };
        Ship::new(PlayerSlot::One, Vec2::ZERO, &loadout, 2)
    }

    #[test]
    fn armor_reduces_damage() {
        let mut ship = ship_with(Passives::default(), 400.0);
        let report = ship.take_damage(40.0, Vec2::ZERO);
        assert!((report.applied - 20.0).abs() < 1e-4);
        assert!((ship.health - 80.0).abs() < 1e-4);
    }

    #[test]
    fn damage_resistance_stacks_with_armor() {
        let passives = Passives {
            damage_resistance: true,
            ..Passives::default()
        };
        let mut ship = ship_with(passives, 0.0);
        let report = ship.take_damage(20.0, Vec2::ZERO);
        assert!((report.applied - 17.0).abs() < 1e-4);
    }

    #[test]
    fn last_chance_saves_once_per_round() {
        let passives = Passives {
            last_chance: true,
            ..Passives::default()
        };
        let mut ship = ship_with(passives, 0.0);

        let first = ship.take_damage(500.0, Vec2::ZERO);
        assert!(first.last_chance_triggered);
        assert!(!first.destroyed);
        assert_eq!(ship.health, 1.0);

        let second = ship.take_damage(500.0, Vec2::ZERO);
        assert!(second.destroyed);
        assert!(ship.is_destroyed());

        ship.reset_for_round(Vec2::ZERO, 2);
        assert!(!ship.last_chance_used());
        assert!(ship.take_damage(500.0, Vec2::ZERO).last_chance_triggered);
    }

    #[test]
    fn destruction_is_reported_exactly_once() {
        let mut ship = ship_with(Passives::default(), 0.0);
        assert!(ship.take_damage(150.0, Vec2::ZERO).destroyed);
        let again = ship.take_damage(150.0, Vec2::ZERO);
        assert!(!again.destroyed);
        assert_eq!(again.applied, 0.0);
        assert_eq!(ship.health, 0.0);
    }

    #[test]
    fn untagged_contact_resolves_to_tagged_ancestor() {
        let ship = ship_with(Passives::default(), 0.0);
        // Hull (1) sits under the core (0)
        assert_eq!(ship.resolve_tagged_part(1), 0);
        assert_eq!(ship.resolve_tagged_part(2), 2);
    }

    #[test]
    fn detach_takes_subtree_but_never_core() {
        let mut ship = ship_with(Passives::default(), 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let loose = ship.detach(6, Vec2::new(0.0, -3.0), 20.0, 0.5, 3.0, &mut rng);
        let mut sorted = loose.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![6, 7, 8]);
        assert!(ship.parts[8].drift.length() > 0.0);

        let from_core = ship.detach(0, Vec2::ZERO, 20.0, 0.5, 3.0, &mut rng);
        assert!(!ship.parts[0].detached);
        assert!(!from_core.contains(&0));
        assert!(from_core.contains(&1));
    }

    #[test]
    fn overtime_effects_only_run_while_active() {
        let passives = Passives {
            regeneration: true,
            damage_ramp: true,
            ..Passives::default()
        };
        let mut ship = ship_with(passives, 0.0);
        ship.take_damage(10.0, Vec2::ZERO);

        ship.tick_overtime(1.0);
        assert_eq!(ship.health, 90.0);

        ship.overtime_active = true;
        ship.tick_overtime(1.0);
        assert!((ship.health - 92.0).abs() < 1e-4);
        assert!((ship.ramp_bonus - DAMAGE_RAMP_PER_SEC).abs() < 1e-6);
    }

    #[test]
    fn move_extension_is_once_per_round() {
        let passives = Passives {
            move_extension: true,
            ..Passives::default()
        };
        let mut ship = ship_with(passives, 0.0);
        assert!(ship.arm_move_extension());
        assert!(ship.skip_end_turn);
        assert!(!ship.arm_move_extension());
    }
}
