mod common;

use rand::{SeedableRng, rngs::StdRng};
use tree_regularizer::{
    Augmentation, ComplexityObservation, DataAugmentor, SurrogateStart, SurrogateTrainer,
};

use common::{setup, small_config};

fn observations(network: &machine_learning::Network, count: usize) -> Vec<ComplexityObservation> {
    let base = network.flatten();

    (0..count)
        .map(|i| ComplexityObservation {
            params: base.iter().map(|p| p * (1.0 + 0.5 * i as f32)).collect(),
            apl: 1.0 + i as f32,
        })
        .collect()
}

#[test]
fn dirichlet_turns_three_observations_into_ten_synthetic_ones() {
    let (ctx, network, _, x_reference) = setup(small_config());
    let mut rng = StdRng::seed_from_u64(0);
    let observed = observations(&network, 3);

    let augmentor = DataAugmentor::new(Augmentation::Dirichlet {
        synth_count: 10,
        subset: None,
    });
    let synthetic = augmentor
        .augment(&observed, &network, &ctx.estimator(), x_reference.view(), &mut rng)
        .unwrap();

    assert_eq!(synthetic.len(), 10);
    for obs in &synthetic {
        assert_eq!(obs.params.len(), network.size());
        assert!(obs.apl >= 0.0);
    }
}

#[test]
fn augmentation_never_touches_the_primary_network() {
    let (ctx, network, _, x_reference) = setup(small_config());
    let before = network.flatten();
    let mut rng = StdRng::seed_from_u64(1);
    let observed = observations(&network, 4);

    for strategy in [
        Augmentation::Dirichlet {
            synth_count: 5,
            subset: Some(2),
        },
        Augmentation::Gaussian {
            synth_count: 5,
            scale: 0.3,
        },
    ] {
        let synthetic = DataAugmentor::new(strategy)
            .augment(&observed, &network, &ctx.estimator(), x_reference.view(), &mut rng)
            .unwrap();

        assert_eq!(synthetic.len(), 5);
        assert_eq!(network.flatten(), before);
    }
}

#[test]
fn no_augmentation_adds_nothing() {
    let (ctx, network, _, x_reference) = setup(small_config());
    let mut rng = StdRng::seed_from_u64(2);
    let observed = observations(&network, 2);

    let synthetic = DataAugmentor::new(Augmentation::None)
        .augment(&observed, &network, &ctx.estimator(), x_reference.view(), &mut rng)
        .unwrap();

    assert!(synthetic.is_empty());
}

#[test]
fn surrogate_fits_the_augmented_set() {
    let (ctx, network, _, x_reference) = setup(small_config());
    let mut rng = StdRng::seed_from_u64(3);
    let mut observed = observations(&network, 3);

    let synthetic = DataAugmentor::new(Augmentation::Gaussian {
        synth_count: 4,
        scale: 0.1,
    })
    .augment(&observed, &network, &ctx.estimator(), x_reference.view(), &mut rng)
    .unwrap();
    observed.extend(synthetic);

    let fit = SurrogateTrainer::new(4, 1e-2, 0.0, 10)
        .train(&observed, SurrogateStart::Retrain, None, &mut rng)
        .unwrap();

    assert_eq!(fit.history.len(), 10);
    assert_eq!(fit.surrogate.input_dim(), network.size());
}
