//! Combat system - impact damage, self-destruct blasts, structural damage

use glam::Vec2;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::PhysicsConfig;

use super::contact::Contact;
use super::events::{GameEvent, ImpactTarget, ResolveReason};
use super::projectile::Projectile;
use super::ship::{PartTag, Passives, PlayerSlot, Ship};

/// Core multiplier with the attacker's critical-enhancement passive
pub const CRITICAL_CORE_MULTIPLIER: f32 = 1.5;
/// Core multiplier against a critical-immune defender
pub const IMMUNE_CORE_MULTIPLIER: f32 = 1.0;
pub const LIFESTEAL_FRACTION: f32 = 0.2;
pub const HIGH_SPEED_BONUS: f32 = 0.2;
pub const HIGH_SPEED_REDUCTION: f32 = 0.2;
pub const MIN_DAMAGE: f32 = 1.0;
/// Ship knockback per unit of projectile momentum
pub const KNOCKBACK_SCALE: f32 = 0.05;

/// Rolled damage for a single impact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageRoll {
    pub base: f32,
    pub multiplier: f32,
    pub critical: bool,
    pub damage: f32,
}

/// Outcome of resolving one projectile termination
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// False when the projectile had already been destroyed
    pub resolved: bool,
    pub reason: ResolveReason,
    pub point: Vec2,
    pub target: ImpactTarget,
    pub destroyed_ships: Vec<PlayerSlot>,
    pub events: Vec<GameEvent>,
}

impl Resolution {
    fn empty(reason: ResolveReason, point: Vec2, target: ImpactTarget) -> Self {
        Self {
            resolved: false,
            reason,
            point,
            target,
            destroyed_ships: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// Damage math with no side effects
pub struct CombatSystem;

impl CombatSystem {
    /// Part multiplier and whether the hit counts as critical.
    ///
    /// On the core, defender critical immunity beats attacker critical
    /// enhancement.
    pub fn part_multiplier(tag: PartTag, attacker: &Passives, defender: &Passives) -> (f32, bool) {
        if tag != PartTag::Core {
            return (tag.damage_multiplier(), false);
        }
        if defender.critical_immunity {
            (IMMUNE_CORE_MULTIPLIER, false)
        } else if attacker.critical_enhancement {
            (CRITICAL_CORE_MULTIPLIER, true)
        } else {
            (tag.damage_multiplier(), true)
        }
    }

    /// `payload * U(1 − variation, 1 + variation)`
    pub fn roll_base<R: Rng>(payload: f32, variation: f32, precision: bool, rng: &mut R) -> f32 {
        let variation = if precision {
            0.0
        } else {
            variation.clamp(0.0, 1.0)
        };
        if variation > 0.0 {
            payload * rng.gen_range((1.0 - variation)..=(1.0 + variation))
        } else {
            payload
        }
    }

    /// Full impact damage before armor
    #[allow(clippy::too_many_arguments)]
    pub fn impact_damage<R: Rng>(
        payload: f32,
        variation: f32,
        tag: PartTag,
        attacker: &Ship,
        defender: &Ship,
        impact_speed: f32,
        max_speed: f32,
        high_speed_fraction: f32,
        rng: &mut R,
    ) -> DamageRoll {
        let base = Self::roll_base(payload, variation, attacker.passives.precision, rng);
        let (multiplier, critical) =
            Self::part_multiplier(tag, &attacker.passives, &defender.passives);

        let mut damage =
            (base * multiplier * attacker.effective_damage_multiplier()).max(MIN_DAMAGE);

        if impact_speed >= max_speed * high_speed_fraction {
            if attacker.passives.high_speed_offense {
                damage *= 1.0 + HIGH_SPEED_BONUS;
            }
            if defender.passives.high_speed_defense {
                damage *= 1.0 - HIGH_SPEED_REDUCTION;
            }
        }

        DamageRoll {
            base,
            multiplier,
            critical,
            damage: damage.max(MIN_DAMAGE),
        }
    }

    /// Linear blast falloff in `[0, 1]`
    pub fn blast_ratio(distance: f32, blast_radius: f32) -> f32 {
        if blast_radius <= 0.0 {
            return 0.0;
        }
        (1.0 - distance / blast_radius).clamp(0.0, 1.0)
    }

    pub fn self_destruct_damage(payload: f32, factor: f32, distance: f32, blast_radius: f32) -> f32 {
        payload * factor * Self::blast_ratio(distance, blast_radius)
    }
}

/// Applies the effects of a projectile's end to the ships
pub struct CollisionResolver<'a, R: Rng> {
    ships: &'a mut [Ship],
    physics: &'a PhysicsConfig,
    rng: &'a mut R,
}

impl<'a, R: Rng> CollisionResolver<'a, R> {
    pub fn new(ships: &'a mut [Ship], physics: &'a PhysicsConfig, rng: &'a mut R) -> Self {
        Self { ships, physics, rng }
    }

    fn slot_index(&self, slot: PlayerSlot) -> Option<usize> {
        self.ships.iter().position(|s| s.slot == slot)
    }

    /// Resolve a contact reported for `projectile`. Always ends with the
    /// projectile destroyed (`Collision`).
    pub fn resolve_contact(&mut self, projectile: &mut Projectile, contact: Contact) -> Resolution {
        let point = projectile.position;
        if projectile.is_destroyed() {
            warn!(projectile_id = %projectile.id, "Contact ignored: projectile already destroyed");
            return Resolution::empty(ResolveReason::Collision, point, ImpactTarget::Unknown);
        }

        let mut resolution = match contact {
            Contact::ShipPart { ship, part }
                if ship < self.ships.len() && part < self.ships[ship].parts.len() =>
            {
                self.hit_ship(projectile, ship, part)
            }
            Contact::Body { index } => {
                debug!(projectile_id = %projectile.id, body = index, "Projectile hit body");
                Resolution::empty(ResolveReason::Collision, point, ImpactTarget::Body { index })
            }
            _ => {
                debug!(projectile_id = %projectile.id, "Projectile hit unknown object");
                Resolution::empty(ResolveReason::Collision, point, ImpactTarget::Unknown)
            }
        };

        resolution.resolved = projectile.destroy(ResolveReason::Collision);
        resolution
    }

    fn hit_ship(&mut self, projectile: &Projectile, defender: usize, contact_part: usize) -> Resolution {
        let point = projectile.position;
        let attacker = self.slot_index(projectile.owner).unwrap_or(defender);
        let impact_speed = projectile.speed();

        let part = self.ships[defender].resolve_tagged_part(contact_part);
        let tag = self.ships[defender].parts[part].tag;
        let defender_slot = self.ships[defender].slot;

        let roll = CombatSystem::impact_damage(
            projectile.payload,
            projectile.damage_variation,
            tag,
            &self.ships[attacker],
            &self.ships[defender],
            impact_speed,
            projectile.params.max_speed,
            self.physics.high_speed_fraction,
            &mut *self.rng,
        );

        let mut events = Vec::new();
        let mut destroyed_ships = Vec::new();

        let report = self.ships[defender].take_damage(roll.damage, point);
        events.push(GameEvent::Damage {
            attacker: projectile.owner,
            target: defender_slot,
            amount: report.applied,
            part: Some(tag),
            critical: roll.critical,
            position: point,
        });
        if report.last_chance_triggered {
            events.push(GameEvent::LastChance { ship: defender_slot });
        }

        if self.ships[attacker].passives.lifesteal && report.applied > 0.0 {
            let healed = self.ships[attacker].heal(report.applied * LIFESTEAL_FRACTION);
            if healed > 0.0 {
                events.push(GameEvent::Lifesteal {
                    ship: projectile.owner,
                    amount: healed,
                });
            }
        }

        self.ships[defender].record_hit_taken();
        self.ships[attacker].record_hit_dealt();

        self.ships[defender].apply_impulse(projectile.velocity * projectile.params.mass * KNOCKBACK_SCALE);

        if tag != PartTag::Core {
            let loose = self.ships[defender].detach(
                part,
                point,
                impact_speed,
                self.physics.detach_impulse_scale,
                self.physics.detach_max_torque,
                &mut *self.rng,
            );
            for part_index in loose {
                events.push(GameEvent::PartDetached {
                    ship: defender_slot,
                    part_index,
                    tag: self.ships[defender].parts[part_index].tag,
                });
            }
        }

        if report.destroyed {
            events.push(GameEvent::ShipDestroyed { ship: defender_slot });
            destroyed_ships.push(defender_slot);
        }

        Resolution {
            resolved: false,
            reason: ResolveReason::Collision,
            point,
            target: ImpactTarget::Ship {
                ship: defender_slot,
                part: tag,
            },
            destroyed_ships,
            events,
        }
    }

    /// Self-destruct blast. `Detonated` for manual detonation,
    /// `FuelExhausted` when the tank runs dry. The owner is never hit.
    pub fn self_destruct(&mut self, projectile: &mut Projectile, reason: ResolveReason) -> Resolution {
        let center = projectile.position;
        if projectile.is_destroyed() {
            warn!(projectile_id = %projectile.id, "Self-destruct ignored: projectile already destroyed");
            return Resolution::empty(reason, center, ImpactTarget::Unknown);
        }

        let mut events = Vec::new();
        let mut destroyed_ships = Vec::new();

        for ship in self.ships.iter_mut() {
            if ship.slot == projectile.owner || ship.is_destroyed() {
                continue;
            }
            let offset = ship.position - center;
            let ratio = CombatSystem::blast_ratio(offset.length(), projectile.blast_radius);
            if ratio <= 0.0 {
                continue;
            }

            let damage = projectile.payload * projectile.self_destruct_factor * ratio;
            let report = ship.take_damage(damage, center);
            events.push(GameEvent::Damage {
                attacker: projectile.owner,
                target: ship.slot,
                amount: report.applied,
                part: None,
                critical: false,
                position: center,
            });
            if report.last_chance_triggered {
                events.push(GameEvent::LastChance { ship: ship.slot });
            }

            let direction = offset.try_normalize().unwrap_or(Vec2::Y);
            ship.apply_impulse(direction * projectile.push_strength * ratio);
            ship.record_hit_taken();

            if report.destroyed {
                events.push(GameEvent::ShipDestroyed { ship: ship.slot });
                destroyed_ships.push(ship.slot);
            }
        }

        let resolved = projectile.destroy(reason);
        Resolution {
            resolved,
            reason,
            point: center,
            target: ImpactTarget::Unknown,
            destroyed_ships,
            events,
        }
    }

    /// End a projectile with no effect on the ships (lost in space, flight
    /// timeout).
    pub fn retire(&mut self, projectile: &mut Projectile, reason: ResolveReason) -> Resolution {
        let mut resolution = Resolution::empty(reason, projectile.position, ImpactTarget::Unknown);
        resolution.resolved = projectile.destroy(reason);
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectilePreset;
    use crate::game::ship::ShipLoadout;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ship(slot: PlayerSlot, x: f32, passives: Passives) -> Ship {
        let loadout = ShipLoadout {
            armor: 0.0,
            passives,
            ..ShipLoadout::default()
        };
        Ship::new(slot, Vec2::new(x, 0.0), &loadout, 2)
    }

    fn shot(preset: &ProjectilePreset, at: Vec2) -> Projectile {
        Projectile::launch(PlayerSlot::One, preset, at, Vec2::X, 40.0, false)
    }

    #[test]
    fn defender_immunity_beats_attacker_critical() {
        let attacker = Passives {
            critical_enhancement: true,
            ..Passives::default()
        };
        let defender = Passives {
            critical_immunity: true,
            ..Passives::default()
        };
        assert_eq!(
            CombatSystem::part_multiplier(PartTag::Core, &attacker, &defender),
            (1.0, false)
        );
        assert_eq!(
            CombatSystem::part_multiplier(PartTag::Core, &attacker, &Passives::default()),
            (1.5, true)
        );
        assert_eq!(
            CombatSystem::part_multiplier(PartTag::Core, &Passives::default(), &Passives::default()),
            (1.3, true)
        );
        assert_eq!(
            CombatSystem::part_multiplier(PartTag::Wing, &attacker, &Passives::default()),
            (0.85, false)
        );
    }

    #[test]
    fn precision_removes_roll_spread() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(CombatSystem::roll_base(25.0, 0.5, true, &mut rng), 25.0);
        }
    }

    #[test]
    fn damage_is_floored_at_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = ship(PlayerSlot::One, 0.0, Passives::default());
        let d = ship(PlayerSlot::Two, 10.0, Passives::default());
        let roll = CombatSystem::impact_damage(0.1, 0.0, PartTag::Wing, &a, &d, 1.0, 40.0, 0.8, &mut rng);
        assert_eq!(roll.damage, MIN_DAMAGE);
    }

    #[test]
    fn high_speed_passives_need_fast_impact() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = ship(
            PlayerSlot::One,
            0.0,
            Passives {
                high_speed_offense: true,
                ..Passives::default()
            },
        );
        let d = ship(PlayerSlot::Two, 10.0, Passives::default());
        let slow = CombatSystem::impact_damage(10.0, 0.0, PartTag::Fin, &a, &d, 31.0, 40.0, 0.8, &mut rng);
        let fast = CombatSystem::impact_damage(10.0, 0.0, PartTag::Fin, &a, &d, 33.0, 40.0, 0.8, &mut rng);
        assert_eq!(slow.damage, 10.0);
        assert!((fast.damage - 12.0).abs() < 1e-4);
    }

    #[test]
    fn self_destruct_falloff_bounds() {
        assert_eq!(CombatSystem::self_destruct_damage(40.0, 0.5, 0.0, 8.0), 20.0);
        assert_eq!(CombatSystem::self_destruct_damage(40.0, 0.5, 8.0, 8.0), 0.0);
        assert_eq!(CombatSystem::self_destruct_damage(40.0, 0.5, 30.0, 8.0), 0.0);
        assert_eq!(CombatSystem::self_destruct_damage(40.0, 0.5, 4.0, 8.0), 10.0);
    }

    #[test]
    fn wing_hit_damages_and_detaches() {
        let mut ships = vec![
            ship(PlayerSlot::One, -20.0, Passives::default()),
            ship(PlayerSlot::Two, 20.0, Passives::default()),
        ];
        let physics = PhysicsConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let preset = ProjectilePreset {
            damage_variation: 0.0,
            payload: 20.0,
            ..ProjectilePreset::default()
        };
        let mut projectile = shot(&preset, Vec2::new(21.4, 0.4));

        let resolution = CollisionResolver::new(&mut ships, &physics, &mut rng)
            .resolve_contact(&mut projectile, Contact::ShipPart { ship: 1, part: 3 });

        assert!(resolution.resolved);
        assert!(projectile.is_destroyed());
        assert!((ships[1].health - 83.0).abs() < 1e-4);
        assert!(ships[1].parts[3].detached);
        assert!(ships[1].knockback.x > 0.0);
        assert!(resolution.events.iter().any(|e| matches!(
            e,
            GameEvent::PartDetached { part_index: 3, tag: PartTag::Wing, .. }
        )));
        assert_eq!(
            resolution.target,
            ImpactTarget::Ship {
                ship: PlayerSlot::Two,
                part: PartTag::Wing
            }
        );
    }

    #[test]
    fn core_hit_never_detaches_core() {
        let mut ships = vec![
            ship(PlayerSlot::One, -20.0, Passives::default()),
            ship(PlayerSlot::Two, 20.0, Passives::default()),
        ];
        let physics = PhysicsConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let preset = ProjectilePreset {
            damage_variation: 0.0,
            payload: 10.0,
            ..ProjectilePreset::default()
        };
        let mut projectile = shot(&preset, Vec2::new(20.0, 0.6));

        // Untagged hull resolves to the core above it
        let resolution = CollisionResolver::new(&mut ships, &physics, &mut rng)
            .resolve_contact(&mut projectile, Contact::ShipPart { ship: 1, part: 1 });

        assert!(ships[1].parts.iter().all(|p| !p.detached));
        assert!((ships[1].health - 87.0).abs() < 1e-4);
        assert!(resolution
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::Damage { critical: true, .. })));
    }

    #[test]
    fn lifesteal_and_adaptive_modifiers_update() {
        let mut ships = vec![
            ship(
                PlayerSlot::One,
                -20.0,
                Passives {
                    lifesteal: true,
                    adaptive_damage: true,
                    ..Passives::default()
                },
            ),
            ship(
                PlayerSlot::Two,
                20.0,
                Passives {
                    adaptive_armor: true,
                    ..Passives::default()
                },
            ),
        ];
        ships[0].health = 50.0;
        let physics = PhysicsConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let preset = ProjectilePreset {
            damage_variation: 0.0,
            payload: 20.0,
            ..ProjectilePreset::default()
        };
        let mut projectile = shot(&preset, Vec2::new(20.0, -2.0));

        CollisionResolver::new(&mut ships, &physics, &mut rng)
            .resolve_contact(&mut projectile, Contact::ShipPart { ship: 1, part: 8 });

        // Fin: 20 damage, 20% back to the attacker
        assert!((ships[0].health - 54.0).abs() < 1e-4);
        assert!(ships[0].adaptive_damage_bonus > 0.0);
        assert!(ships[1].adaptive_armor_bonus > 0.0);
    }

    #[test]
    fn lethal_hit_reports_destruction_once() {
        let mut ships = vec![
            ship(PlayerSlot::One, -20.0, Passives::default()),
            ship(PlayerSlot::Two, 20.0, Passives::default()),
        ];
        let physics = PhysicsConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let preset = ProjectilePreset {
            damage_variation: 0.0,
            payload: 500.0,
            ..ProjectilePreset::default()
        };
        let mut first = shot(&preset, Vec2::new(20.0, 0.0));
        let mut second = shot(&preset, Vec2::new(20.0, 0.0));

        let r1 = CollisionResolver::new(&mut ships, &physics, &mut rng)
            .resolve_contact(&mut first, Contact::ShipPart { ship: 1, part: 0 });
        let r2 = CollisionResolver::new(&mut ships, &physics, &mut rng)
            .resolve_contact(&mut second, Contact::ShipPart { ship: 1, part: 0 });

        assert_eq!(r1.destroyed_ships, vec![PlayerSlot::Two]);
        assert!(r2.destroyed_ships.is_empty());
    }

    #[test]
    fn body_hit_deals_no_damage() {
        let mut ships = vec![
            ship(PlayerSlot::One, -20.0, Passives::default()),
            ship(PlayerSlot::Two, 20.0, Passives::default()),
        ];
        let physics = PhysicsConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut projectile = shot(&ProjectilePreset::default(), Vec2::ZERO);

        let resolution = CollisionResolver::new(&mut ships, &physics, &mut rng)
            .resolve_contact(&mut projectile, Contact::Body { index: 2 });

        assert_eq!(resolution.target, ImpactTarget::Body { index: 2 });
        assert!(resolution.events.is_empty());
        assert!(ships.iter().all(|s| s.health == s.max_health));
        assert!(projectile.is_destroyed());

        let again = CollisionResolver::new(&mut ships, &physics, &mut rng)
            .resolve_contact(&mut projectile, Contact::Unknown);
        assert!(!again.resolved);
    }

    #[test]
    fn self_destruct_spares_owner_and_pushes_targets() {
        let mut ships = vec![
            ship(PlayerSlot::One, 0.0, Passives::default()),
            ship(PlayerSlot::Two, 4.0, Passives::default()),
        ];
        let physics = PhysicsConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let preset = ProjectilePreset {
            payload: 40.0,
            self_destruct_factor: 0.5,
            blast_radius: 8.0,
            push_strength: 10.0,
            ..ProjectilePreset::default()
        };
        let mut projectile = shot(&preset, Vec2::ZERO);

        let resolution = CollisionResolver::new(&mut ships, &physics, &mut rng)
            .self_destruct(&mut projectile, ResolveReason::Detonated);

        assert!(resolution.resolved);
        assert_eq!(ships[0].health, ships[0].max_health);
        assert!((ships[1].health - 90.0).abs() < 1e-4);
        assert!((ships[1].knockback.x - 5.0).abs() < 1e-4);
        assert_eq!(
            projectile.state(),
            crate::game::projectile::ProjectileState::Destroyed(ResolveReason::Detonated)
        );
    }

    #[test]
    fn retire_leaves_ships_untouched() {
        let mut ships = vec![
            ship(PlayerSlot::One, -1.0, Passives::default()),
            ship(PlayerSlot::Two, 1.0, Passives::default()),
        ];
        let physics = PhysicsConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut projectile = shot(&ProjectilePreset::default(), Vec2::ZERO);

        let mut resolver = CollisionResolver::new(&mut ships, &physics, &mut rng);
        let first = resolver.retire(&mut projectile, ResolveReason::LostInSpace);
        let second = resolver.retire(&mut projectile, ResolveReason::FlightTimeout);

        assert!(first.resolved);
        assert!(!second.resolved);
        assert!(first.events.is_empty());
        assert!(ships.iter().all(|s| s.health == s.max_health));
    }

    proptest! {
        #[test]
        fn blast_ratio_stays_in_unit_range(distance in 0.0f32..100.0, radius in 0.0f32..50.0) {
            let ratio = CombatSystem::blast_ratio(distance, radius);
            prop_assert!((0.0..=1.0).contains(&ratio));
            if distance >= radius {
                prop_assert_eq!(ratio, 0.0);
            }
        }
    }
}
