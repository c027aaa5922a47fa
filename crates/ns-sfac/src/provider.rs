//! Per-object scale factors and per-event weights.
//!
//! For an object the provider locates the table bin at its `(x, y)`
//! coordinates, clamping out-of-range values to the nearest edge bin, and
//! returns the bin value shifted by the combined uncertainty
//!
//! ```text
//! sigma = sqrt(err^2 + (sys_fraction * value)^2)
//! CT = value
//! UP = value + penalty * sigma
//! DN = value - penalty * sigma
//! ```
//!
//! with `penalty = 2` when either coordinate was clamped and `1` otherwise.
//! The event weight is the product of the factors of every object in the
//! bound collection (`1.0` for an empty collection).

use std::path::Path;

use serde::Serialize;

use crate::config::ScaleFactorConfig;
use crate::error::{Result, SfError};
use crate::file::TableFile;
use crate::histogram::{Axis, Histogram2D};
use crate::mapping::AxisMapping;
use crate::object::{CollectionHandle, Event, PhysicsObject};
use crate::systematic::Systematic;
use crate::table::CorrectionTable;

/// Uncertainty multiplier for objects outside the table range.
pub const OUT_OF_RANGE_PENALTY: f64 = 2.0;

/// Combined one-sigma deviation of a bin.
#[inline]
pub fn combined_sigma(stat_error: f64, sys_fraction: f64, value: f64) -> f64 {
    (stat_error * stat_error + (sys_fraction * value).powi(2)).sqrt()
}

/// Result of locating an object in the correction table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinLookup {
    /// X bin used (after clamping).
    pub bin_x: usize,
    /// Y bin used (after clamping).
    pub bin_y: usize,
    /// Bin central value.
    pub value: f64,
    /// Bin statistical uncertainty.
    pub error: f64,
    /// Whether either coordinate fell outside the table and was clamped.
    pub out_of_range: bool,
}

impl BinLookup {
    /// Multiplier applied to sigma for the up/down variations.
    pub fn penalty(&self) -> f64 {
        if self.out_of_range { OUT_OF_RANGE_PENALTY } else { 1.0 }
    }
}

/// Event weights for all three variations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SystematicWeights {
    /// Nominal weight.
    pub central: f64,
    /// Up-shifted weight.
    pub up: f64,
    /// Down-shifted weight.
    pub down: f64,
}

impl SystematicWeights {
    /// All-neutral weights.
    pub const NEUTRAL: SystematicWeights = SystematicWeights { central: 1.0, up: 1.0, down: 1.0 };

    /// Weight for one variation.
    pub fn get(&self, sys: Systematic) -> f64 {
        match sys {
            Systematic::Central => self.central,
            Systematic::Up => self.up,
            Systematic::Down => self.down,
        }
    }
}

/// Clamp an axis lookup to the in-range bins; the flag reports clamping.
fn clamped_bin(axis: &Axis, v: f64) -> (usize, bool) {
    let n = axis.n_bins();
    match axis.find_bin(v) {
        0 => (1, true),
        b if b > n => (n, true),
        b => (b, false),
    }
}

fn validate_sys_fraction(sys_fraction: f64) -> Result<f64> {
    if (0.0..1.0).contains(&sys_fraction) {
        Ok(sys_fraction)
    } else {
        Err(SfError::Configuration(format!(
            "invalid value for additional systematic uncertainty: sys_fraction={sys_fraction} \
             (expected 0 <= sys_fraction < 1)"
        )))
    }
}

/// Scale-factor provider bound to one object collection and one table.
///
/// Immutable after construction, so a single provider can serve concurrent
/// `weight`/`factor` calls from several threads.
#[derive(Debug, Clone)]
pub struct ScaleFactorProvider<T: CorrectionTable = Histogram2D> {
    handle: CollectionHandle,
    table: T,
    mapping: AxisMapping,
    sys_fraction: f64,
    verbose: bool,
}

impl ScaleFactorProvider<Histogram2D> {
    /// Load `table` from the table file at `file` and bind it to `collection`.
    ///
    /// The axis orientation is read from the `table` path. The file is only
    /// held while the table is read; the provider owns the loaded table.
    pub fn open(
        collection: impl Into<String>,
        file: impl AsRef<Path>,
        table: &str,
        sys_fraction: f64,
    ) -> Result<Self> {
        let file = file.as_ref();
        let source = TableFile::open(file).map_err(|e| {
            SfError::Configuration(format!(
                "failed to open scale-factor file {}: {e}",
                file.display()
            ))
        })?;
        let hist = source.get_table(table).map_err(|e| {
            SfError::Configuration(format!(
                "failed to load scale-factor table {}/{table}: {e}",
                file.display()
            ))
        })?;
        Self::build(CollectionHandle::new(collection), hist, table, sys_fraction)
    }

    /// Construct from a [`ScaleFactorConfig`].
    pub fn from_config(cfg: &ScaleFactorConfig) -> Result<Self> {
        Ok(Self::open(cfg.collection.clone(), &cfg.file, &cfg.table, cfg.sys_fraction)?
            .with_verbose(cfg.verbose))
    }
}

impl<T: CorrectionTable> ScaleFactorProvider<T> {
    /// Bind an already-loaded table; the orientation is read from its name.
    pub fn new(collection: impl Into<String>, table: T, sys_fraction: f64) -> Result<Self> {
        let name = table.name().to_string();
        Self::build(CollectionHandle::new(collection), table, &name, sys_fraction)
    }

    fn build(
        handle: CollectionHandle,
        table: T,
        declared_name: &str,
        sys_fraction: f64,
    ) -> Result<Self> {
        let mapping = AxisMapping::from_table_name(declared_name)?;
        let sys_fraction = validate_sys_fraction(sys_fraction)?;
        log::debug!(
            "scale factors for '{}': table '{}' ({:?}, {}x{} bins), sys_fraction={}",
            handle.name(),
            declared_name,
            mapping,
            table.x_axis().n_bins(),
            table.y_axis().n_bins(),
            sys_fraction
        );
        Ok(Self { handle, table, mapping, sys_fraction, verbose: false })
    }

    /// Enable or disable the per-object diagnostic line.
    ///
    /// When enabled, [`Self::weight`], [`Self::factors`] and [`Self::weights`]
    /// log one `info` line per object and variation.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Bound collection.
    pub fn collection(&self) -> &CollectionHandle {
        &self.handle
    }

    /// Underlying table.
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Axis orientation derived at construction.
    pub fn mapping(&self) -> AxisMapping {
        self.mapping
    }

    /// Flat systematic fraction.
    pub fn sys_fraction(&self) -> f64 {
        self.sys_fraction
    }

    /// Whether per-object diagnostics are enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Locate an object's bin, clamping each axis independently.
    pub fn lookup<O: PhysicsObject + ?Sized>(&self, obj: &O) -> BinLookup {
        let (val_x, val_y) = self.mapping.coordinates(obj);
        let (bin_x, oor_x) = clamped_bin(self.table.x_axis(), val_x);
        let (bin_y, oor_y) = clamped_bin(self.table.y_axis(), val_y);
        let out_of_range = oor_x || oor_y;
        if out_of_range {
            log::trace!(
                "clamped ({}, {}) to bin ({}, {}) of '{}'",
                val_x,
                val_y,
                bin_x,
                bin_y,
                self.table.name()
            );
        }
        BinLookup {
            bin_x,
            bin_y,
            value: self.table.content(bin_x, bin_y),
            error: self.table.error(bin_x, bin_y),
            out_of_range,
        }
    }

    /// Combined one-sigma deviation for a located bin (penalty not applied).
    pub fn sigma(&self, lookup: &BinLookup) -> f64 {
        combined_sigma(lookup.error, self.sys_fraction, lookup.value)
    }

    /// Scale factor for a located bin under a variation.
    pub fn vary(&self, lookup: &BinLookup, sys: Systematic) -> f64 {
        match sys {
            Systematic::Central => lookup.value,
            _ => lookup.value + sys.sign() * lookup.penalty() * self.sigma(lookup),
        }
    }

    fn report<O: PhysicsObject + ?Sized>(&self, obj: &O, sfac: f64, sys: Systematic) {
        if self.verbose {
            log::info!(
                "{}: pt={} eta={} SF={} (sys={})",
                self.handle.name(),
                obj.pt(),
                obj.eta(),
                sfac,
                sys
            );
        }
    }

    /// Scale factor for one object.
    pub fn factor<O: PhysicsObject + ?Sized>(&self, obj: &O, sys: Systematic) -> f64 {
        self.vary(&self.lookup(obj), sys)
    }

    /// Scale factor for one object with the variation given as `CT`/`UP`/`DN`.
    pub fn factor_for_key<O: PhysicsObject + ?Sized>(&self, obj: &O, key: &str) -> Result<f64> {
        Ok(self.factor(obj, key.parse()?))
    }

    /// Product of the scale factors of every object in the bound collection.
    pub fn weight<E: Event>(&self, evt: &E, sys: Systematic) -> Result<f64> {
        let objs = evt.collection(&self.handle)?;
        let mut wgt = 1.0;
        for obj in objs {
            let sfac = self.factor(obj, sys);
            self.report(obj, sfac, sys);
            wgt *= sfac;
        }
        Ok(wgt)
    }

    /// [`Self::weight`] with the variation given as `CT`/`UP`/`DN`.
    pub fn weight_for_key<E: Event>(&self, evt: &E, key: &str) -> Result<f64> {
        self.weight(evt, key.parse()?)
    }

    /// Per-object scale factors in collection order.
    pub fn factors<E: Event>(&self, evt: &E, sys: Systematic) -> Result<Vec<f64>> {
        let objs = evt.collection(&self.handle)?;
        Ok(objs
            .iter()
            .map(|obj| {
                let sfac = self.factor(obj, sys);
                self.report(obj, sfac, sys);
                sfac
            })
            .collect())
    }

    /// Event weights for all three variations from one pass over the collection.
    pub fn weights<E: Event>(&self, evt: &E) -> Result<SystematicWeights> {
        let objs = evt.collection(&self.handle)?;
        let mut w = SystematicWeights::NEUTRAL;
        for obj in objs {
            let lookup = self.lookup(obj);
            for sys in Systematic::ALL {
                let sfac = self.vary(&lookup, sys);
                self.report(obj, sfac, sys);
                match sys {
                    Systematic::Central => w.central *= sfac,
                    Systematic::Up => w.up *= sfac,
                    Systematic::Down => w.down *= sfac,
                }
            }
        }
        Ok(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Candidate, EventRecord};
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::sync::Once;

    thread_local! {
        static CAPTURED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    /// Collects `info` records per test thread.
    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
            metadata.level() <= log::Level::Info
        }

        fn log(&self, record: &log::Record<'_>) {
            if self.enabled(record.metadata()) {
                CAPTURED.with(|c| c.borrow_mut().push(record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;
    static INIT: Once = Once::new();

    fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
        INIT.call_once(|| {
            log::set_logger(&LOGGER).unwrap();
            log::set_max_level(log::LevelFilter::Info);
        });
        CAPTURED.with(|c| c.borrow_mut().clear());
        let out = f();
        (out, CAPTURED.with(|c| c.take()))
    }

    /// One bin: |eta| in [0, 2.5], pt in [20, 1000], 0.95 +- 0.02.
    fn single_bin(sys_fraction: f64) -> ScaleFactorProvider {
        let h = Histogram2D::new(
            "NUM_TightID_DEN_genTracks_abseta_pt_ratio",
            Axis::new(vec![0.0, 2.5]).unwrap(),
            Axis::new(vec![20.0, 1000.0]).unwrap(),
            vec![0.95],
        )
        .unwrap()
        .with_errors(vec![0.02])
        .unwrap();
        ScaleFactorProvider::new("muons", h, sys_fraction).unwrap()
    }

    /// pt on X (20, 40, 100), |eta| on Y (0, 1.2, 2.4).
    fn grid() -> ScaleFactorProvider {
        let h = Histogram2D::new(
            "IsoMu24_pt_abseta_ratio",
            Axis::new(vec![20.0, 40.0, 100.0]).unwrap(),
            Axis::new(vec![0.0, 1.2, 2.4]).unwrap(),
            vec![0.90, 0.92, 0.94, 0.96],
        )
        .unwrap()
        .with_errors(vec![0.01, 0.02, 0.03, 0.04])
        .unwrap();
        ScaleFactorProvider::new("muons", h, 0.0).unwrap()
    }

    #[test]
    fn test_worked_example_in_range() {
        let p = single_bin(0.05);
        let mu = Candidate::new(50.0, 1.0);
        let sigma = (0.02f64.powi(2) + (0.05f64 * 0.95).powi(2)).sqrt();
        assert_relative_eq!(sigma, 0.051539, epsilon = 1e-6);

        let lookup = p.lookup(&mu);
        assert!(!lookup.out_of_range);
        assert_relative_eq!(p.sigma(&lookup), sigma, epsilon = 1e-12);
        assert_eq!(p.factor(&mu, Systematic::Central), 0.95);
        assert_relative_eq!(p.factor(&mu, Systematic::Up), 0.95 + sigma, epsilon = 1e-12);
        assert_relative_eq!(p.factor(&mu, Systematic::Down), 0.95 - sigma, epsilon = 1e-12);
        assert_relative_eq!(p.factor(&mu, Systematic::Up), 1.001539, epsilon = 1e-6);
        assert_relative_eq!(p.factor(&mu, Systematic::Down), 0.898461, epsilon = 1e-6);
    }

    #[test]
    fn test_worked_example_out_of_range() {
        let p = single_bin(0.05);
        let mu = Candidate::new(2000.0, 1.0);
        let lookup = p.lookup(&mu);
        assert!(lookup.out_of_range);
        assert_eq!((lookup.bin_x, lookup.bin_y), (1, 1));
        assert_eq!(lookup.penalty(), 2.0);
        assert_eq!(p.factor(&mu, Systematic::Central), 0.95);
        assert_relative_eq!(p.factor(&mu, Systematic::Up), 1.053078, epsilon = 1e-6);
        assert_relative_eq!(p.factor(&mu, Systematic::Down), 0.846922, epsilon = 1e-6);
    }

    #[test]
    fn test_clamping_each_axis() {
        let p = grid();
        // Below pt range, |eta| in range.
        let l = p.lookup(&Candidate::new(10.0, 2.0));
        assert_eq!((l.bin_x, l.bin_y, l.out_of_range), (1, 2, true));
        assert_eq!(l.value, 0.94);
        // Above |eta| range (eta sign ignored), pt in range.
        let l = p.lookup(&Candidate::new(50.0, -3.0));
        assert_eq!((l.bin_x, l.bin_y, l.out_of_range), (2, 2, true));
        assert_eq!(l.value, 0.96);
        // Upper edge is outside the half-open last bin.
        let l = p.lookup(&Candidate::new(100.0, 0.0));
        assert_eq!((l.bin_x, l.bin_y, l.out_of_range), (2, 1, true));
        // Lower edge is inside.
        let l = p.lookup(&Candidate::new(20.0, 0.0));
        assert_eq!((l.bin_x, l.bin_y, l.out_of_range), (1, 1, false));
        // Both axes out of range still penalise only once.
        let l = p.lookup(&Candidate::new(5.0, 9.0));
        assert_eq!((l.bin_x, l.bin_y), (1, 2));
        assert_eq!(l.penalty(), 2.0);
    }

    #[test]
    fn test_in_range_central_is_bin_content() {
        let p = grid();
        let cases =
            [((30.0, 0.3), 0.90), ((60.0, -0.3), 0.92), ((39.9, 1.5), 0.94), ((99.0, -2.3), 0.96)];
        for ((pt, eta), want) in cases {
            let mu = Candidate::new(pt, eta);
            assert!(!p.lookup(&mu).out_of_range);
            assert_eq!(p.factor(&mu, Systematic::Central), want);
        }
    }

    #[test]
    fn test_up_down_symmetric() {
        let p = single_bin(0.1);
        for mu in [Candidate::new(50.0, 0.2), Candidate::new(5.0, 2.7), Candidate::new(1e4, -1.0)] {
            let ct = p.factor(&mu, Systematic::Central);
            let up = p.factor(&mu, Systematic::Up);
            let dn = p.factor(&mu, Systematic::Down);
            assert_relative_eq!(up - ct, ct - dn, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sigma_monotonic_in_fraction() {
        let mut last = 0.0;
        for i in 0..20 {
            let s = combined_sigma(0.02, i as f64 * 0.05, 0.95);
            assert!(s >= last);
            last = s;
        }
        assert_eq!(combined_sigma(0.02, 0.0, 0.95), 0.02);
    }

    #[test]
    fn test_sys_fraction_bounds() {
        for bad in [1.0, 1.5, -0.01, f64::NAN] {
            let h = single_bin(0.0).table().clone();
            assert!(
                matches!(ScaleFactorProvider::new("muons", h, bad), Err(SfError::Configuration(_))),
                "{bad}"
            );
        }
        assert_eq!(single_bin(0.0).sys_fraction(), 0.0);
        assert_eq!(single_bin(0.999).sys_fraction(), 0.999);
    }

    #[test]
    fn test_unrecognised_orientation() {
        let h = Histogram2D::new(
            "NUM_TightID_eta_pt",
            Axis::new(vec![0.0, 2.5]).unwrap(),
            Axis::new(vec![20.0, 1000.0]).unwrap(),
            vec![0.95],
        )
        .unwrap();
        let err = ScaleFactorProvider::new("muons", h, 0.0).unwrap_err();
        assert!(matches!(err, SfError::Configuration(_)));
    }

    #[test]
    fn test_weight_is_product_of_factors() {
        let p = grid();
        let objs =
            vec![Candidate::new(30.0, 0.3), Candidate::new(60.0, -1.5), Candidate::new(500.0, 0.1)];
        let evt = EventRecord::new().with_collection("muons", objs.clone());
        for sys in Systematic::ALL {
            let expected: f64 = objs.iter().map(|o| p.factor(o, sys)).product();
            assert_relative_eq!(p.weight(&evt, sys).unwrap(), expected, epsilon = 1e-12);
            assert_eq!(p.factors(&evt, sys).unwrap().len(), 3);

            let reversed: Vec<Candidate> = objs.iter().rev().copied().collect();
            let evt_rev = EventRecord::new().with_collection("muons", reversed);
            assert_relative_eq!(
                p.weight(&evt_rev, sys).unwrap(),
                p.weight(&evt, sys).unwrap(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_empty_collection_is_neutral() {
        let p = grid().with_verbose(true);
        let evt = EventRecord::new().with_collection("muons", vec![]);
        for sys in Systematic::ALL {
            assert_eq!(p.weight(&evt, sys).unwrap(), 1.0);
        }
        assert_eq!(p.weights(&evt).unwrap(), SystematicWeights::NEUTRAL);
    }

    #[test]
    fn test_weights_match_single_variation() {
        let p = single_bin(0.05);
        let evt = EventRecord::new().with_collection(
            "muons",
            vec![Candidate::new(50.0, 1.0), Candidate::new(2000.0, -0.4)],
        );
        let all = p.weights(&evt).unwrap();
        for sys in Systematic::ALL {
            assert_eq!(all.get(sys), p.weight(&evt, sys).unwrap());
        }
    }

    #[test]
    fn test_verbose_does_not_change_result() {
        let evt = EventRecord::new().with_collection("muons", vec![Candidate::new(45.0, 0.7)]);
        let quiet = grid();
        let loud = grid().with_verbose(true);
        assert!(loud.is_verbose());
        for sys in Systematic::ALL {
            assert_eq!(quiet.weight(&evt, sys).unwrap(), loud.weight(&evt, sys).unwrap());
        }
    }

    #[test]
    fn test_verbose_line_per_object() {
        let objs = vec![Candidate::new(30.0, 0.3), Candidate::new(500.0, -1.5)];
        let evt = EventRecord::new().with_collection("muons", objs);
        let loud = grid().with_verbose(true);

        let (w, lines) = capture(|| loud.weight(&evt, Systematic::Up).unwrap());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("muons: pt=30 eta=0.3 SF="), "{}", lines[0]);
        assert!(lines[1].starts_with("muons: pt=500 eta=-1.5 SF="), "{}", lines[1]);
        assert!(lines.iter().all(|l| l.ends_with("(sys=UP)")));
        let sf1 = loud.factor(&Candidate::new(30.0, 0.3), Systematic::Up);
        assert!(lines[0].contains(&format!("SF={sf1} ")));
        assert_relative_eq!(
            w,
            sf1 * loud.factor(&Candidate::new(500.0, -1.5), Systematic::Up),
            epsilon = 1e-12
        );

        let (_, lines) = capture(|| loud.factors(&evt, Systematic::Down).unwrap());
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.ends_with("(sys=DN)")));

        let (_, lines) = capture(|| loud.weights(&evt).unwrap());
        assert_eq!(lines.len(), 6);
        for sys in Systematic::ALL {
            let tag = format!("(sys={sys})");
            assert_eq!(lines.iter().filter(|l| l.ends_with(&tag)).count(), 2);
        }

        let (_, lines) = capture(|| grid().weights(&evt).unwrap());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_string_keys() {
        let p = single_bin(0.05);
        let mu = Candidate::new(50.0, 1.0);
        assert_eq!(p.factor_for_key(&mu, "UP").unwrap(), p.factor(&mu, Systematic::Up));
        assert!(matches!(p.factor_for_key(&mu, "XX"), Err(SfError::InvalidArgument(_))));

        let evt = EventRecord::new().with_collection("muons", vec![mu]);
        assert_eq!(p.weight_for_key(&evt, "DN").unwrap(), p.factor(&mu, Systematic::Down));
        assert!(matches!(p.weight_for_key(&evt, "nominal"), Err(SfError::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_collection() {
        let p = grid();
        let evt = EventRecord::new().with_collection("electrons", vec![]);
        assert!(matches!(p.weight(&evt, Systematic::Central), Err(SfError::InvalidArgument(_))));
    }
}
