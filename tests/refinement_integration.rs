use gaussfocus::status::{
    evaluate_focus_moments, find_focus_moments, solve_focus_sigma, PEAK_FILVAL_SCALE,
};
use gaussfocus::{
    evaluate_moments, locate_peak, solve_sigma, FocusError, Kernel, LimitStage, OwnedImage,
    PeakDirection, PeakLocator,
};

fn star(width: usize, height: usize, cx: f64, cy: f64, sigma: f64) -> OwnedImage<u16> {
    OwnedImage::from_fn(width, height, |x, y| {
        let r2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
        (100.0 + 30_000.0 * (-r2 / (2.0 * sigma * sigma)).exp()).round() as u16
    })
    .unwrap()
}

#[test]
fn off_peak_seed_relocates_to_maximum() {
    let image = star(41, 41, 20.0, 20.0, 1.4);
    let kernel = Kernel::generate(1.4).unwrap();

    let fit = locate_peak(image.view(), 17, 22, 100, &kernel).unwrap();
    assert!(fit.retries >= 3, "retries {}", fit.retries);
    assert_eq!((fit.x, fit.y), (20, 20));
    assert!((fit.moments.xf - 20.5).abs() < 1e-9);
    assert!((fit.moments.yf - 20.5).abs() < 1e-9);

    let (moments, code) = find_focus_moments(image.view(), 17, 22, 100, &kernel);
    assert_eq!(code as usize, fit.retries);
    let moments = moments.unwrap();
    assert_eq!((moments.xf, moments.yf), (fit.moments.xf, fit.moments.yf));
    assert_eq!(moments.xmom, fit.moments.xmom);
    assert_eq!(moments.filval, fit.moments.filval / PEAK_FILVAL_SCALE);
}

#[test]
fn relocation_budget_is_reported() {
    let image = star(41, 41, 20.0, 20.0, 1.4);
    let kernel = Kernel::generate(1.4).unwrap();

    let err = PeakLocator::new(&kernel)
        .with_max_retries(2)
        .locate(image.view(), 17, 22, 100)
        .err()
        .unwrap();
    assert_eq!(
        err,
        FocusError::IterationLimit {
            stage: LimitStage::PeakSearch,
            limit: 2,
        }
    );
    assert_eq!(err.find_status(), -1);
}

#[test]
fn peak_filval_exceeds_neighbors() {
    let image = star(41, 41, 20.4, 19.7, 1.6);
    let kernel = Kernel::generate(1.6).unwrap();
    let fit = locate_peak(image.view(), 20, 20, 100, &kernel).unwrap();

    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            let m = evaluate_moments(
                image.view(),
                fit.x.wrapping_add_signed(dx),
                fit.y.wrapping_add_signed(dy),
                100,
                &kernel,
            )
            .unwrap();
            assert!(m.filval <= fit.moments.filval);
        }
    }
}

#[test]
fn flat_patch_is_rejected() {
    let image = OwnedImage::from_fn(41, 41, |_, _| 700u16).unwrap();
    let kernel = Kernel::generate(1.5).unwrap();

    let err = locate_peak(image.view(), 20, 20, 0, &kernel).err().unwrap();
    assert_eq!(
        err,
        FocusError::FlatPeak {
            direction: PeakDirection::Horizontal,
        }
    );
    assert_eq!(err.find_status(), -3);

    let err = solve_sigma(image.view(), 20, 20, 0, Some(1.5)).err().unwrap();
    assert_eq!(err.solve_status(), -6);
}

#[test]
fn sky_equal_to_image_is_degenerate() {
    let image = OwnedImage::from_fn(41, 41, |_, _| 700u16).unwrap();
    let kernel = Kernel::generate(1.5).unwrap();

    let err = evaluate_moments(image.view(), 20, 20, 700, &kernel).err().unwrap();
    assert_eq!(err, FocusError::DegenerateIntegral { x: 20, y: 20 });
    assert_eq!(evaluate_focus_moments(image.view(), 20, 20, 700, &kernel).1, -2);
    assert_eq!(find_focus_moments(image.view(), 20, 20, 700, &kernel).1, -2);

    let mut sigma = 1.5;
    assert_eq!(solve_focus_sigma(image.view(), 20, 20, 700, &mut sigma).1, -5);
    assert_eq!(sigma, 1.5);
}

#[test]
fn edge_proximity_applies_to_every_operation() {
    let image = star(41, 41, 20.0, 20.0, 1.5);
    let kernel = Kernel::generate(1.5).unwrap();
    let ncut = kernel.ncut();

    assert!(evaluate_moments(image.view(), ncut, 20, 0, &kernel).is_ok());
    let err = evaluate_moments(image.view(), ncut - 1, 20, 0, &kernel)
        .err()
        .unwrap();
    assert!(matches!(err, FocusError::EdgeProximity { margin, .. } if margin == ncut));

    let far = 41 - ncut;
    assert!(matches!(
        evaluate_moments(image.view(), 20, far, 0, &kernel),
        Err(FocusError::EdgeProximity { .. })
    ));
    assert!(matches!(
        locate_peak(image.view(), ncut - 1, 20, 0, &kernel),
        Err(FocusError::EdgeProximity { .. })
    ));
    assert!(matches!(
        solve_sigma(image.view(), 20, 2, 0, Some(1.5)),
        Err(FocusError::EdgeProximity { .. })
    ));

    let mut sigma = 1.5;
    assert_eq!(solve_focus_sigma(image.view(), 20, 2, 0, &mut sigma).1, -4);
}

#[test]
fn out_of_range_moment_is_named() {
    // Two bright pixels three columns from the center put almost all weight
    // into the x tails.
    let image = OwnedImage::from_fn(31, 31, |x, y| {
        if y == 15 && (x == 12 || x == 18) {
            5000u16
        } else {
            0
        }
    })
    .unwrap();
    let kernel = Kernel::generate(1.0).unwrap();

    let moments = evaluate_moments(image.view(), 15, 15, 0, &kernel).unwrap();
    assert!(moments.xmom >= 1.0, "xmom {}", moments.xmom);
    let err = moments.check_range().err().unwrap();
    assert!(matches!(err, FocusError::OutOfRange { moment: "xmom", .. }));
    assert_eq!(err.solve_status(), -2);
}
