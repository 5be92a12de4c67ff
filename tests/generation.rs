//! End-to-end generation scenarios
//!
//! These tests drive the whole pipeline through the public API:
//! - termination: a fixed seed either produces a town or exhausts the
//!   attempt budget, it never hangs
//! - ward coverage: every surviving parcel carries exactly one ward
//! - wall invariants: gates sit on the circumference, towers off gates
//! - determinism: the same seed reproduces the same town byte for byte

use townwright::{GenerationError, Model, WardKind};

/// Seeds that produce a town within the attempt budget are found by
/// scanning; generation is allowed to fail fatally for unlucky seeds, it
/// just has to terminate.
fn first_successful(n_patches: usize, seeds: impl IntoIterator<Item = u64>) -> Option<Model> {
    seeds
        .into_iter()
        .find_map(|seed| Model::generate(n_patches, seed).ok())
}

// ============================================================================
// Termination and the seed-42 scenario
// ============================================================================

#[test]
fn test_seed_42_five_patches_terminates() {
    match Model::generate(5, 42) {
        Ok(model) => {
            assert_eq!(model.inner.len(), 5);
            assert!(!model.gates.is_empty());
            for &pid in &model.inner {
                let patch = model.find_patch(pid).expect("inner patch survived");
                assert!(patch.within_city);
                assert!(patch.ward.is_some());
            }
        }
        // A documented fatal failure is acceptable; hanging is not.
        Err(GenerationError::RetriesExhausted { attempts }) => assert_eq!(attempts, 100),
        Err(other) => panic!("unexpected terminal error: {other}"),
    }
}

#[test]
fn test_small_towns_terminate_across_seeds() {
    for seed in [1, 2, 3, 7, 99] {
        let _ = Model::generate(3, seed);
    }
}

// ============================================================================
// Ward coverage
// ============================================================================

#[test]
fn test_every_patch_carries_a_ward() {
    let model = first_successful(8, 1..40).expect("no seed in range produced a town");
    for patch in &model.patches {
        assert!(
            patch.ward.is_some(),
            "patch {:?} left without a ward",
            patch.id
        );
    }
    // The countryside is farms and plain wards only.
    for patch in &model.patches {
        if !patch.within_city {
            let kind = &patch.ward.as_ref().expect("checked above").kind;
            assert!(
                matches!(kind, WardKind::Farm | WardKind::Common | WardKind::Gate(_)),
                "countryside patch got {}",
                patch.ward.as_ref().expect("checked above").label()
            );
        }
    }
}

#[test]
fn test_plaza_becomes_market() {
    // Scan for a town that drew a plaza.
    let model = (1..60)
        .filter_map(|seed| Model::generate(8, seed).ok())
        .find(|m| m.plaza.is_some())
        .expect("no plaza town in seed range");
    let plaza = model
        .find_patch(model.plaza.expect("filtered on plaza"))
        .expect("plaza patch exists");
    assert!(matches!(
        plaza.ward.as_ref().expect("plaza is assigned").kind,
        WardKind::Market
    ));
}

// ============================================================================
// Wall invariants
// ============================================================================

#[test]
fn test_border_gates_lie_on_the_circumference() {
    let model = first_successful(8, 1..40).expect("no seed in range produced a town");
    let border = model.border.as_ref().expect("border always built");
    assert!(!border.gates.is_empty());
    for gate in &border.gates {
        assert!(border.shape.contains(*gate));
    }
    for tower in &border.towers {
        assert!(!border.gates.contains(tower));
    }
}

#[test]
fn test_citadel_towns_carry_castle_and_compact_shape() {
    let model = (1..80)
        .filter_map(|seed| Model::generate(8, seed).ok())
        .find(|m| m.citadel.is_some());
    let Some(model) = model else {
        // No citadel town in range; nothing to check.
        return;
    };
    let citadel = model
        .find_patch(model.citadel.expect("filtered on citadel"))
        .expect("citadel patch exists");
    assert!(citadel.shape.compactness(&model.store) >= 0.75);
    assert!(matches!(
        citadel.ward.as_ref().expect("castle assigned").kind,
        WardKind::Castle(_)
    ));
    assert!(model.citadel_wall().is_some());
    assert!(model.citadel_radius().unwrap_or(0.0) > 0.0);
}

// ============================================================================
// Streets
// ============================================================================

#[test]
fn test_streets_exist_and_touch_every_gate() {
    let model = first_successful(8, 1..40).expect("no seed in range produced a town");
    assert_eq!(model.streets.len(), model.gates.len());
    for (street, gate) in model.streets.iter().zip(&model.gates) {
        assert!(
            street.first() == Some(*gate) || street.last() == Some(*gate),
            "street does not start or end at its gate"
        );
    }
    assert!(!model.arteries.is_empty());
}

#[test]
fn test_city_radius_covers_inner_patches() {
    let model = first_successful(8, 1..40).expect("no seed in range produced a town");
    assert!(model.city_radius > 0.0);
    for &pid in &model.inner {
        let patch = model.find_patch(pid).expect("inner patch survived");
        let max_r = patch
            .shape
            .positions(&model.store)
            .map(|p| p.length())
            .fold(0.0, f64::max);
        assert!(max_r <= model.city_radius + 1e-6);
    }
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_same_seed_reproduces_the_same_town() {
    let seed = (1..40)
        .find(|&s| Model::generate(6, s).is_ok())
        .expect("no seed in range produced a town");
    let a = Model::generate(6, seed).expect("seed succeeded once");
    let b = Model::generate(6, seed).expect("same seed, same outcome");
    let ja = serde_json::to_string(&a).expect("model serializes");
    let jb = serde_json::to_string(&b).expect("model serializes");
    assert_eq!(ja, jb);
}

#[test]
fn test_different_seeds_differ() {
    let mut towns = (1..40).filter_map(|s| Model::generate(6, s).ok());
    let (Some(a), Some(b)) = (towns.next(), towns.next()) else {
        return;
    };
    let ja = serde_json::to_string(&a).expect("model serializes");
    let jb = serde_json::to_string(&b).expect("model serializes");
    assert_ne!(ja, jb);
}
