/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Magnitude zero-point of the nanomaggie flux unit.
pub const NANOMAGGY_ZEROPOINT: f64 = 22.5;

/// Arcseconds per degree.
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Default side length (pixels) of the model-fit stamp window.
pub const DEFAULT_STAMP_SIZE: usize = 64;

/// Largest side length (pixels) of an auto-sized convolution stamp.
pub const MAX_FFT_STAMP_SIZE: usize = 256;

/// Smallest side length (pixels) of an auto-sized convolution stamp.
pub const MIN_FFT_STAMP_SIZE: usize = 16;

/// Sub-pixel samples per axis when integrating a galaxy profile over a pixel.
pub const PROFILE_OVERSAMPLE: usize = 5;

/// Radius of a galaxy stamp in units of the half-light semi-major axis.
pub const PROFILE_EXTENT_HLR: f64 = 8.0;

/// PSF patch half-width in units of sigma.
pub const PSF_PATCH_NSIGMA: f64 = 5.0;

/// Relative flux tolerance both stamp renderers must meet on a noiseless point source.
pub const RENDER_FLUX_TOLERANCE: f64 = 1e-3;

/// Default collision radius (arcsec).
pub const DEFAULT_COLLISION_RADIUS_ARCSEC: f64 = 5.0;

/// Default radius (arcsec) for matching fitted sources back to injected rows.
pub const DEFAULT_MATCH_RADIUS_ARCSEC: f64 = 1.5;

/// Expected amplifier half-width of a DECam CCD (pixels).
pub const DECAM_HALF_WIDTH: i64 = 1023;

/// Default detection threshold of the synthetic pipeline (sigma).
pub const DEFAULT_DETECT_NSIGMA: f64 = 5.0;

/// Gauss-Newton iterations of the synthetic point-source fit.
pub const FIT_ITERATIONS: usize = 12;

/// Half-width (pixels) of the fitting window around a detected peak.
pub const FIT_HALF_WIDTH: usize = 7;

/// Default pixel scale (arcsec/pixel) of a synthetic brick.
pub const DEFAULT_PIXEL_SCALE: f64 = 0.262;

/// Default side length (pixels) of a synthetic brick.
pub const DEFAULT_BRICK_SIZE: usize = 200;
