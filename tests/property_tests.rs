use huddle::{Clusterer, Dbscan, HardClusterer, Kmeans, Optics};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_kmeans_labels_cover_every_point(
        data in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 2..20),
        k in 2usize..5
    ) {
        let engine = Kmeans::new(50, k).unwrap().with_seed(42);
        engine.learn(data.clone()).unwrap();

        let guesses = engine.guesses().unwrap();
        prop_assert_eq!(guesses.len(), data.len());
        for &label in &guesses {
            prop_assert!((0..k as i32).contains(&label));
        }

        let sizes = engine.sizes().unwrap();
        prop_assert_eq!(sizes.len(), k);
        prop_assert_eq!(sizes.iter().sum::<usize>(), data.len());
    }

    #[test]
    fn prop_dbscan_labels_are_noise_or_one_based(
        data in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 1..30),
        minpts in 1usize..5
    ) {
        let engine = Dbscan::new(minpts, 1.0, 0).unwrap();
        engine.learn(data.clone()).unwrap();

        let guesses = engine.guesses().unwrap();
        prop_assert_eq!(guesses.len(), data.len());

        let sizes = engine.sizes().unwrap();
        let clusters = sizes.len() as i32;
        let mut noise = 0usize;
        for &label in &guesses {
            // The unassigned sentinel must never survive training.
            prop_assert!(label == -1 || (1..=clusters).contains(&label));
            if label == -1 {
                noise += 1;
            }
        }
        prop_assert_eq!(sizes.iter().sum::<usize>() + noise, data.len());
    }

    #[test]
    fn prop_optics_labels_stay_in_range(
        data in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 1..30),
        minpts in 1usize..5
    ) {
        let engine = Optics::new(minpts, 2.0, 0.05, 0).unwrap();
        engine.learn(data.clone()).unwrap();

        let guesses = engine.guesses().unwrap();
        prop_assert_eq!(guesses.len(), data.len());

        let clusters = engine.sizes().unwrap().len() as i32;
        for &label in &guesses {
            prop_assert!((0..=clusters).contains(&label));
        }
    }

    #[test]
    fn prop_predict_reproduces_dbscan_training_labels(
        data in prop::collection::vec(prop::collection::vec(-10.0f64..10.0, 2), 1..20)
    ) {
        let engine = Dbscan::new(2, 1.5, 0).unwrap();
        engine.learn(data.clone()).unwrap();

        let guesses = engine.guesses().unwrap();
        for (i, row) in data.iter().enumerate() {
            prop_assert_eq!(engine.predict(row).unwrap(), guesses[i]);
        }
    }
}
