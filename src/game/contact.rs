//! Contact detection seam
//!
//! The host environment normally reports what a projectile touched. The
//! default probe here does circle overlap against attached ship parts and
//! bodies so the core can run headless.

use super::gravity::GravityField;
use super::projectile::Projectile;
use super::ship::Ship;

/// Ticks after launch during which a projectile ignores its owner's ship
pub const ARMING_TICKS: u32 = 15;

/// What a projectile is touching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    ShipPart { ship: usize, part: usize },
    Body { index: usize },
    Unknown,
}

/// Contact detection collaborator
pub trait ContactProbe: Send {
    fn probe(&self, projectile: &Projectile, ships: &[Ship], field: &GravityField) -> Option<Contact>;
}

/// Circle-overlap contact detection
#[derive(Debug, Default, Clone, Copy)]
pub struct CircleContacts;

impl ContactProbe for CircleContacts {
    fn probe(&self, projectile: &Projectile, ships: &[Ship], field: &GravityField) -> Option<Contact> {
        for (ship_index, ship) in ships.iter().enumerate() {
            if ship.is_destroyed() {
                continue;
            }
            if ship.slot == projectile.owner && projectile.age_ticks() < ARMING_TICKS {
                continue;
            }
            let hit = ship.parts.iter().enumerate().find(|(part_index, part)| {
                !part.detached && {
                    let reach = part.radius + projectile.contact_radius;
                    ship.part_position(*part_index)
                        .distance_squared(projectile.position)
                        <= reach * reach
                }
            });
            if let Some((part, _)) = hit {
                return Some(Contact::ShipPart {
                    ship: ship_index,
                    part,
                });
            }
        }

        field
            .body_at(projectile.position, projectile.contact_radius)
            .map(|index| Contact::Body { index })
    }
}
