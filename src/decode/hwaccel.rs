//! Opportunistic hardware decode.
//!
//! Devices are tried from a fixed per-platform table in priority order. Any failure leaves the
//! decoder on the software path; nothing here is ever fatal.
#![allow(unsafe_code)]

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use ffmpeg_next as ffmpeg;
use ffmpeg::ffi::{self, AVBufferRef, AVCodecContext, AVHWDeviceType, AVPixelFormat};
use ffmpeg::format::Pixel;
use ffmpeg::frame;

/// Whether decode sessions may use a hardware device.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HwAccel {
    /// Try the platform's devices, fall back to software.
    #[default]
    Auto,
    /// Always decode in software.
    Off,
}

/// Outcome of hardware setup for one decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HwStatus {
    /// Hardware decode was not requested.
    Disabled,
    /// No device could be used; decoding in software.
    Unavailable(String),
    /// Decoding on the named device.
    Active(&'static str),
    /// A device was attached but the decoder negotiated a software format.
    FellBack(&'static str),
}

impl HwStatus {
    /// Return `true` when frames come from a hardware device.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

struct HwCandidate {
    name: &'static str,
    device: AVHWDeviceType,
}

#[cfg(target_os = "linux")]
const HW_CANDIDATES: &[HwCandidate] = &[
    HwCandidate {
        name: "vaapi",
        device: AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
    },
    HwCandidate {
        name: "cuda",
        device: AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
    },
    HwCandidate {
        name: "vdpau",
        device: AVHWDeviceType::AV_HWDEVICE_TYPE_VDPAU,
    },
];

#[cfg(target_os = "windows")]
const HW_CANDIDATES: &[HwCandidate] = &[
    HwCandidate {
        name: "d3d11va",
        device: AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
    },
    HwCandidate {
        name: "dxva2",
        device: AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2,
    },
    HwCandidate {
        name: "cuda",
        device: AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
    },
];

#[cfg(target_os = "macos")]
const HW_CANDIDATES: &[HwCandidate] = &[HwCandidate {
    name: "videotoolbox",
    device: AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
}];

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
const HW_CANDIDATES: &[HwCandidate] = &[];

// AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX
const HW_CONFIG_METHOD_DEVICE_CTX: i32 = 0x01;
// AV_PIX_FMT_FLAG_HWACCEL
const PIX_FMT_FLAG_HWACCEL: u64 = 1 << 3;

/// Owned reference to a libav hardware device context.
struct HwDevice {
    device_ref: *mut AVBufferRef,
}

impl Drop for HwDevice {
    fn drop(&mut self) {
        // SAFETY: `device_ref` came from `av_hwdevice_ctx_create` and is unreferenced exactly once.
        unsafe { ffi::av_buffer_unref(&mut self.device_ref) };
    }
}

/// Pixel format the decoder should pick, read by [`negotiate_format`] through the codec
/// context's `opaque` pointer. One per decoder, never shared.
struct FormatPreference {
    pix_fmt: AVPixelFormat,
    fell_back: AtomicBool,
}

/// Hardware state attached to one decoder context. Must outlive the decoder.
pub(crate) struct HwDecode {
    name: &'static str,
    hw_pixel: Pixel,
    preference: Box<FormatPreference>,
    _device: HwDevice,
}

// SAFETY: the device reference is only touched on drop and libav device contexts are
// thread-safe reference-counted buffers; the preference is atomics plus a plain enum.
unsafe impl Send for HwDecode {}

impl HwDecode {
    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn status(&self) -> HwStatus {
        if self.preference.fell_back.load(Ordering::Relaxed) {
            HwStatus::FellBack(self.name)
        } else {
            HwStatus::Active(self.name)
        }
    }

    /// Return `true` when `frame` lives in device memory.
    pub(crate) fn is_hw_frame(&self, frame: &frame::Video) -> bool {
        frame.format() == self.hw_pixel
    }
}

/// Attach the first usable device to an unopened decoder context.
pub(crate) fn attach(
    ctx: &mut ffmpeg::codec::context::Context,
    codec: ffmpeg::Codec,
) -> Result<HwDecode, String> {
    if !cfg!(feature = "hwaccel") {
        return Err("built without the hwaccel feature".to_string());
    }
    if HW_CANDIDATES.is_empty() {
        return Err("no hardware device kinds known for this platform".to_string());
    }

    for cand in HW_CANDIDATES {
        let Some(pix_fmt) = device_pixel_format(codec, cand.device) else {
            tracing::debug!(device = cand.name, "codec has no config for device");
            continue;
        };

        let mut device_ref: *mut AVBufferRef = ptr::null_mut();
        // SAFETY: out-pointer is valid; null device string/options select the default device.
        let ret = unsafe {
            ffi::av_hwdevice_ctx_create(
                &mut device_ref,
                cand.device,
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };
        if ret < 0 || device_ref.is_null() {
            tracing::debug!(
                device = cand.name,
                error = %ffmpeg::Error::from(ret),
                "hardware device creation failed"
            );
            continue;
        }
        let device = HwDevice { device_ref };
        let preference = Box::new(FormatPreference {
            pix_fmt,
            fell_back: AtomicBool::new(false),
        });

        // SAFETY: `ctx` is an allocated, not yet opened codec context. The codec context takes
        // its own device reference; `opaque` points into a heap allocation owned by the returned
        // `HwDecode`, which the caller keeps alive for as long as the decoder.
        unsafe {
            let raw = ctx.as_mut_ptr();
            let ctx_ref = ffi::av_buffer_ref(device.device_ref);
            if ctx_ref.is_null() {
                tracing::debug!(device = cand.name, "av_buffer_ref failed");
                continue;
            }
            (*raw).hw_device_ctx = ctx_ref;
            (*raw).opaque = (&*preference as *const FormatPreference) as *mut c_void;
            (*raw).get_format = Some(negotiate_format);
        }

        return Ok(HwDecode {
            name: cand.name,
            hw_pixel: Pixel::from(pix_fmt),
            preference,
            _device: device,
        });
    }

    Err("no hardware device could be created".to_string())
}

/// Copy a device frame into system memory, keeping its timestamps.
pub(crate) fn transfer_to_system(hw: &frame::Video) -> Result<frame::Video, ffmpeg::Error> {
    let mut sw = frame::Video::empty();
    // SAFETY: both frames are valid AVFrames; `sw` is empty so libav allocates its buffers.
    let ret = unsafe { ffi::av_hwframe_transfer_data(sw.as_mut_ptr(), hw.as_ptr(), 0) };
    if ret < 0 {
        return Err(ffmpeg::Error::from(ret));
    }
    // SAFETY: as above; copies pts/best-effort timestamp and side data only.
    let ret = unsafe { ffi::av_frame_copy_props(sw.as_mut_ptr(), hw.as_ptr()) };
    if ret < 0 {
        return Err(ffmpeg::Error::from(ret));
    }
    Ok(sw)
}

fn device_pixel_format(codec: ffmpeg::Codec, device: AVHWDeviceType) -> Option<AVPixelFormat> {
    let mut i = 0;
    loop {
        // SAFETY: `codec` wraps a static AVCodec; the returned config is static or null.
        let cfg = unsafe { ffi::avcodec_get_hw_config(codec.as_ptr(), i) };
        if cfg.is_null() {
            return None;
        }
        // SAFETY: non-null config returned by libav.
        let (methods, device_type, pix_fmt) =
            unsafe { ((*cfg).methods, (*cfg).device_type, (*cfg).pix_fmt) };
        if methods & HW_CONFIG_METHOD_DEVICE_CTX != 0 && device_type == device {
            return Some(pix_fmt);
        }
        i += 1;
    }
}

fn is_hw_pixel_format(fmt: AVPixelFormat) -> bool {
    // SAFETY: descriptor lookup accepts any value and returns a static descriptor or null.
    let desc = unsafe { ffi::av_pix_fmt_desc_get(fmt) };
    // SAFETY: non-null descriptors are static.
    !desc.is_null() && unsafe { (*desc).flags } & PIX_FMT_FLAG_HWACCEL != 0
}

/// `get_format` callback: pick the preferred device format, else the first software format.
unsafe extern "C" fn negotiate_format(
    ctx: *mut AVCodecContext,
    fmts: *const AVPixelFormat,
) -> AVPixelFormat {
    // SAFETY: libav passes the context we configured in `attach`, whose `opaque` is either null
    // or a live `FormatPreference`, and a list terminated by AV_PIX_FMT_NONE.
    unsafe {
        let pref = (*ctx).opaque as *const FormatPreference;
        let mut first_sw = AVPixelFormat::AV_PIX_FMT_NONE;
        let mut p = fmts;
        while *p != AVPixelFormat::AV_PIX_FMT_NONE {
            if !pref.is_null() && *p == (*pref).pix_fmt {
                return *p;
            }
            if first_sw == AVPixelFormat::AV_PIX_FMT_NONE && !is_hw_pixel_format(*p) {
                first_sw = *p;
            }
            p = p.add(1);
        }
        if !pref.is_null() {
            (*pref).fell_back.store(true, Ordering::Relaxed);
        }
        first_sw
    }
}
