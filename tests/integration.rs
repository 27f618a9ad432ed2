//! Integration tests for bmpfx.

use bmpfx::bitmap::{Bitmap, row_stride};
use bmpfx::cli::Config;
use bmpfx::driver::run_coordinator_with;
use bmpfx::filters::{Operation, luma};
use bmpfx::metrics::parse_record;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

mod helpers {
    //! Test helpers for building bitmaps on disk.

    use super::*;

    /// A gradient image with non-trivial row padding.
    pub fn gradient(width: u32, height: u32, seed: usize) -> Bitmap {
        let len = row_stride(width as usize) * height as usize;
        let pixels = (0..len).map(|i| ((i * 31 + seed * 17) % 256) as u8).collect();
        Bitmap::with_pixels(width, height, pixels).unwrap()
    }

    /// Raw bytes of a bottom-up 24-bit bitmap whose header carries a 4-byte
    /// gap before the pixel array.
    pub fn bitmap_with_gap(width: u32, height: u32) -> Vec<u8> {
        let stride = row_stride(width as usize);
        let offset = 58u32;
        let size = offset as usize + stride * height as usize;

        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(b"BM");
        data.extend_from_slice(&(size as u32).to_le_bytes());
        data.extend_from_slice(&[0; 4]);
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&40u32.to_le_bytes());
        data.extend_from_slice(&(width as i32).to_le_bytes());
        data.extend_from_slice(&(height as i32).to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&24u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&[0; 20]);
        data.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        data.extend((0..stride * height as usize).map(|i| (i % 251) as u8));
        data
    }

    /// A workspace with `img/` filled by `images` and empty `out/` and `logs/`.
    pub fn workspace(images: &[(&str, Bitmap)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("img");
        fs::create_dir(&img).unwrap();
        for (name, bitmap) in images {
            bitmap.write(&img.join(name)).unwrap();
        }
        dir
    }

    pub fn args(root: &Path, extra: &[&str]) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            root.join("img").into(),
            "-o".into(),
            root.join("out").into(),
            "-l".into(),
            root.join("logs").into(),
            "-r".into(),
            root.join("report_total.txt").into(),
        ];
        args.extend(extra.iter().map(OsString::from));
        args
    }

    pub fn config(root: &Path, extra: &[&str]) -> Config {
        let mut full = vec![OsString::from("bmpfx")];
        full.extend(args(root, extra));
        Config::parse_from_args(full).unwrap()
    }

    pub fn report_value(text: &str, label: &str) -> u64 {
        text.lines()
            .find_map(|l| l.strip_prefix(label))
            .and_then(|v| v.trim().parse().ok())
            .unwrap()
    }

    pub fn sum_records(dir: &Path) -> (u64, u64, usize) {
        let mut totals = (0, 0, 0);
        for entry in fs::read_dir(dir).unwrap() {
            let traffic = parse_record(&fs::read_to_string(entry.unwrap().path()).unwrap());
            totals.0 += traffic.reads;
            totals.1 += traffic.writes;
            totals.2 += 1;
        }
        totals
    }
}

use helpers::*;

fn output(root: &Path, name: &str) -> PathBuf {
    root.join("out").join(name)
}

#[test]
fn test_single_process_run() {
    let dir = workspace(&[("alpha.bmp", gradient(7, 5, 1)), ("beta.bmp", gradient(4, 9, 2))]);
    let root = dir.path();

    let run_config = config(root, &["-j", "3", "61"]);
    let summary = run_coordinator_with(&run_config, Path::new("/unused")).unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.images, 2);

    for base in ["alpha", "beta"] {
        for op in Operation::ALL {
            assert!(output(root, &op.output_file_name(base, 61)).exists(), "{base} {op:?}");
        }
    }

    let (reads, writes, records) = sum_records(&root.join("logs"));
    assert_eq!(records, 16);
    let text = fs::read_to_string(root.join("report_total.txt")).unwrap();
    assert_eq!(report_value(&text, "Total reads:"), reads);
    assert_eq!(report_value(&text, "Total writes:"), writes);
    assert_eq!(report_value(&text, "Total instructions:"), (reads + writes) * 20);
}

#[test]
fn test_outputs_match_filter_properties() {
    let source = gradient(7, 5, 3);
    let dir = workspace(&[("img.bmp", source.clone())]);
    let root = dir.path();
    run_coordinator_with(&config(root, &["-j", "1"]), Path::new("/unused")).unwrap();

    let gray = Bitmap::read(&output(root, "img_gray.bmp")).unwrap();
    assert_eq!(gray.header(), source.header());
    for y in 0..5 {
        for x in 0..7 {
            let [b, g, r] = source.pixel(x, y);
            let v = luma(r, g, b);
            assert_eq!(gray.pixel(x, y), [v, v, v]);
        }
    }

    let hinv = Bitmap::read(&output(root, "img_hinv_color.bmp")).unwrap();
    for y in 0..5 {
        for x in 0..7 {
            assert_eq!(hinv.pixel(x, y), source.pixel(6 - x, y));
        }
    }

    let vinv = Bitmap::read(&output(root, "img_vinv_gray.bmp")).unwrap();
    for y in 0..5 {
        assert_eq!(vinv.pixel(0, y), gray.pixel(0, 4 - y));
    }

    let blur = Bitmap::read(&output(root, "img_blur_105.bmp")).unwrap();
    assert_eq!(blur.header(), source.header());
    assert_eq!(blur.pixels().len(), source.pixels().len());
}

#[test]
fn test_header_gap_is_preserved() {
    let dir = workspace(&[]);
    let root = dir.path();
    let raw = bitmap_with_gap(5, 3);
    fs::write(root.join("img").join("gap.bmp"), &raw).unwrap();

    run_coordinator_with(&config(root, &[]), Path::new("/unused")).unwrap();

    let written = fs::read(output(root, "gap_hinv_color.bmp")).unwrap();
    assert_eq!(written.len(), raw.len());
    assert_eq!(&written[..58], &raw[..58]);
}

#[test]
fn test_unsupported_image_does_not_stop_others() {
    let dir = workspace(&[("good.bmp", gradient(3, 3, 4))]);
    let root = dir.path();
    let mut raw = bitmap_with_gap(3, 3);
    raw[30] = 1; // BI_RLE8
    fs::write(root.join("img").join("rle.bmp"), raw).unwrap();

    let summary = run_coordinator_with(&config(root, &[]), Path::new("/unused")).unwrap();
    assert_eq!(summary.failures, 6);
    assert!(!summary.is_clean());
    assert!(output(root, "good_blur_105.bmp").exists());
    assert!(!output(root, "rle_gray.bmp").exists());
    assert!(root.join("report_total.txt").exists());
}

#[test]
fn test_two_process_binary_run() {
    let images: Vec<(String, Bitmap)> = (0..5)
        .map(|i| (format!("img{i}.bmp"), gradient(6, 4, i)))
        .collect();
    let refs: Vec<(&str, Bitmap)> = images.iter().map(|(n, b)| (n.as_str(), b.clone())).collect();
    let dir = workspace(&refs);
    let root = dir.path();

    let status = Command::new(env!("CARGO_BIN_EXE_bmpfx"))
        .args(args(root, &["-p", "2", "-j", "2", "55"]))
        .env("NO_COLOR", "1")
        .status()
        .unwrap();
    assert!(status.success());

    for i in 0..5 {
        for op in Operation::ALL {
            let name = op.output_file_name(&format!("img{i}"), 55);
            assert!(output(root, &name).exists(), "{name}");
        }
    }

    let (reads, writes, records) = sum_records(&root.join("logs"));
    assert_eq!(records, 40);
    let text = fs::read_to_string(root.join("report_total.txt")).unwrap();
    assert_eq!(report_value(&text, "Total reads:"), reads);
    assert_eq!(report_value(&text, "Total writes:"), writes);
}

#[test]
fn test_binary_rejects_bad_option() {
    let status = Command::new(env!("CARGO_BIN_EXE_bmpfx"))
        .arg("--threads=0")
        .status()
        .unwrap();
    assert!(!status.success());
}
