//! PDF rasterization via poppler command-line tools.

use std::path::PathBuf;
use std::process::Output;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tempfile::TempDir;
use tokio::process::Command;

use super::{PageImage, RasterError, RasterSource, RENDER_SCALE};

const PDFINFO_NOT_FOUND: &str = "pdfinfo not found (install poppler-utils)";
const PDFTOPPM_NOT_FOUND: &str = "pdftoppm not found (install poppler-utils)";

/// Media box size and `/Rotate` of one page as reported by pdfinfo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
    pub rotation: u32,
}

impl PageGeometry {
    /// Size of the page as displayed, after applying its rotation.
    pub fn visible_size(&self) -> (f32, f32) {
        if self.rotation % 180 == 90 {
            (self.height_pt, self.width_pt)
        } else {
            (self.width_pt, self.height_pt)
        }
    }
}

/// A PDF spooled to a temp file, rendered page by page.
#[derive(Debug)]
pub struct PdfSource {
    // Held so the spooled file lives as long as the source.
    _dir: TempDir,
    path: PathBuf,
    pages: Vec<PageGeometry>,
}

impl PdfSource {
    pub async fn open(bytes: &[u8]) -> Result<Self, RasterError> {
        let dir = TempDir::new()?;
        let path = dir.path().join("document.pdf");
        tokio::fs::write(&path, bytes).await?;

        let summary = run_tool("pdfinfo", PDFINFO_NOT_FOUND, |cmd| {
            cmd.arg(&path);
        })
        .await?;
        let page_count = parse_page_count(&summary)?;

        let last = page_count.to_string();
        let detail = run_tool("pdfinfo", PDFINFO_NOT_FOUND, |cmd| {
            cmd.args(["-f", "1", "-l", &last]).arg(&path);
        })
        .await?;
        let pages = parse_page_geometry(&detail, page_count)?;

        tracing::debug!("Opened PDF with {} pages", pages.len());

        Ok(Self {
            _dir: dir,
            path,
            pages,
        })
    }

    fn geometry(&self, page: u32) -> Result<PageGeometry, RasterError> {
        let total = self.page_count();
        if page == 0 || page > total {
            return Err(RasterError::PageOutOfRange { page, total });
        }
        Ok(self.pages[(page - 1) as usize])
    }
}

#[async_trait]
impl RasterSource for PdfSource {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    async fn render_page(&self, page: u32) -> Result<PageImage, RasterError> {
        let geometry = self.geometry(page)?;
        let out_dir = TempDir::new()?;
        let prefix = out_dir.path().join("page");
        let page_str = page.to_string();
        let dpi = (72.0 * RENDER_SCALE).round().to_string();

        // pdftoppm applies /Rotate itself, so the raster has the visible
        // geometry and no rotation left to normalize.
        run_tool("pdftoppm", PDFTOPPM_NOT_FOUND, |cmd| {
            cmd.args(["-png", "-r", &dpi, "-f", &page_str, "-l", &page_str, "-singlefile"])
                .arg(&self.path)
                .arg(&prefix);
        })
        .await
        .map_err(|e| match e {
            RasterError::Malformed(message) => RasterError::Render { page, message },
            other => other,
        })?;

        let png = tokio::fs::read(prefix.with_extension("png"))
            .await
            .map_err(|e| RasterError::Render {
                page,
                message: format!("no image generated: {}", e),
            })?;

        let (width_pt, height_pt) = geometry.visible_size();
        Ok(PageImage {
            number: page,
            width_pt,
            height_pt,
            png,
        })
    }
}

/// Run a poppler tool, mapping spawn and exit failures to raster errors.
async fn run_tool<F>(program: &str, not_found: &str, configure: F) -> Result<String, RasterError>
where
    F: FnOnce(&mut Command),
{
    let mut cmd = Command::new(program);
    configure(&mut cmd);

    let output: Output = match cmd.output().await {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RasterError::ToolNotAvailable(not_found.to_string()))
        }
        Err(e) => return Err(RasterError::Io(e)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RasterError::Malformed(format!(
            "{} failed: {}",
            program,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extract the `Pages:` count from pdfinfo output.
pub fn parse_page_count(info: &str) -> Result<u32, RasterError> {
    let count = info
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse::<u32>().ok())
        .ok_or_else(|| RasterError::Malformed("pdfinfo reported no page count".to_string()))?;

    if count == 0 {
        return Err(RasterError::Empty);
    }
    Ok(count)
}

static SIZE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Page\s+(\d+)\s+size:\s+([\d.]+)\s+x\s+([\d.]+)").unwrap()
});
static ROT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Page\s+(\d+)\s+rot:\s+(\d+)").unwrap());

/// Parse per-page `size` and `rot` lines from `pdfinfo -f 1 -l N` output.
pub fn parse_page_geometry(info: &str, page_count: u32) -> Result<Vec<PageGeometry>, RasterError> {
    let mut pages = vec![None::<PageGeometry>; page_count as usize];

    for line in info.lines() {
        if let Some(caps) = SIZE_LINE.captures(line) {
            let Some(slot) = page_slot(&mut pages, &caps[1]) else {
                continue;
            };
            let width_pt = caps[2].parse::<f32>().unwrap_or_default();
            let height_pt = caps[3].parse::<f32>().unwrap_or_default();
            let rotation = slot.map_or(0, |g| g.rotation);
            *slot = Some(PageGeometry {
                width_pt,
                height_pt,
                rotation,
            });
        } else if let Some(caps) = ROT_LINE.captures(line) {
            let Some(slot) = page_slot(&mut pages, &caps[1]) else {
                continue;
            };
            let geometry = slot.get_or_insert(PageGeometry {
                width_pt: 0.0,
                height_pt: 0.0,
                rotation: 0,
            });
            geometry.rotation = caps[2].parse::<u32>().unwrap_or(0) % 360;
        }
    }

    pages
        .into_iter()
        .enumerate()
        .map(|(idx, geometry)| {
            geometry
                .filter(|g| g.width_pt > 0.0 && g.height_pt > 0.0)
                .ok_or_else(|| {
                    RasterError::Malformed(format!("no geometry reported for page {}", idx + 1))
                })
        })
        .collect()
}

fn page_slot<'a>(
    pages: &'a mut [Option<PageGeometry>],
    number: &str,
) -> Option<&'a mut Option<PageGeometry>> {
    let number = number.parse::<usize>().ok()?;
    pages.get_mut(number.checked_sub(1)?)
}

/// Whether the poppler binaries are on PATH.
pub fn poppler_available() -> bool {
    which::which("pdfinfo").is_ok() && which::which("pdftoppm").is_ok()
}
