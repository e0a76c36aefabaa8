//! Background tile loading
//!
//! A fixed pool of worker threads pulls [`LoadRequest`]s from a shared
//! crossbeam queue, fetches the bytes through a [`Fetch`] implementation,
//! decodes them and replies on the request's own bounded channel. The render
//! loop never blocks: tiles poll their receivers with `try_recv`.

use crate::core::config::{LoaderOptions, SourceKind};
use crate::core::geo::TileCoord;
use crate::data::mvt;
use crate::tiles::tile::SourceData;
use crate::{MapError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Byte transport for tile URLs
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

impl<F> Fetch for F
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self(url)
    }
}

/// Shared blocking client with the default User-Agent so that public tile
/// servers don't reject the request.
static SHARED_CLIENT: OnceCell<Client> = OnceCell::new();

fn build_client(options: &LoaderOptions) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(options.user_agent.as_str())
        .timeout(options.timeout())
        .build()?)
}

/// HTTP(S) fetcher built on `reqwest`'s blocking client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(options: &LoaderOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(options)?,
        })
    }

    /// Fetcher reusing one process-wide client built with default options
    pub fn shared() -> Result<Self> {
        let client = SHARED_CLIENT.get_or_try_init(|| build_client(&LoaderOptions::default()))?;
        Ok(Self {
            client: client.clone(),
        })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MapError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes()?.to_vec())
    }
}

/// One source of one tile
#[derive(Debug)]
pub struct LoadRequest {
    pub coord: TileCoord,
    pub url: String,
    pub kind: SourceKind,
    pub tile_size: u32,
    pub cancel: Arc<AtomicBool>,
    pub reply: Sender<Result<SourceData>>,
}

/// Turn fetched bytes into source data
pub fn decode(kind: SourceKind, bytes: &[u8], tile_size: u32) -> Result<SourceData> {
    match kind {
        SourceKind::Raster => {
            let image = image::load_from_memory(bytes)?.to_rgba8();
            Ok(SourceData::Raster(Arc::new(image)))
        }
        SourceKind::Vector => Ok(SourceData::Vector(mvt::decode(bytes, tile_size)?)),
    }
}

fn is_retryable(err: &MapError) -> bool {
    match err {
        MapError::Network(_) | MapError::Io(_) => true,
        MapError::Http { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    retries: usize,
    delay: Duration,
}

fn fetch_with_retry(fetcher: &dyn Fetch, req: &LoadRequest, policy: RetryPolicy) -> Result<Vec<u8>> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        log::debug!("fetch tile {} attempt {}", req.coord, attempt);
        match fetcher.fetch(&req.url) {
            Ok(bytes) => return Ok(bytes),
            Err(err) if attempt <= policy.retries && is_retryable(&err) => {
                log::warn!("tile {} fetch failed on attempt {}: {}", req.coord, attempt, err);
                if req.cancel.load(Ordering::Relaxed) {
                    return Err(err);
                }
                thread::sleep(policy.delay);
            }
            Err(err) => return Err(err),
        }
    }
}

fn worker_loop(queue: Receiver<LoadRequest>, fetcher: Arc<dyn Fetch>, policy: RetryPolicy) {
    for req in queue.iter() {
        if req.cancel.load(Ordering::Relaxed) {
            log::debug!("skip cancelled tile {}", req.coord);
            continue;
        }
        let result = fetch_with_retry(fetcher.as_ref(), &req, policy)
            .and_then(|bytes| decode(req.kind, &bytes, req.tile_size));
        match &result {
            Ok(_) => log::debug!("loaded tile {} from {}", req.coord, req.url),
            Err(err) => log::warn!("tile {} from {} failed: {}", req.coord, req.url, err),
        }
        // The tile may have been pruned meanwhile; nobody is listening then
        let _ = req.reply.send(result);
    }
}

/// Worker pool fed by an unbounded queue
pub struct TileLoader {
    queue: Sender<LoadRequest>,
    workers: usize,
}

impl TileLoader {
    pub fn new(fetcher: Arc<dyn Fetch>, options: &LoaderOptions) -> Result<Self> {
        let (queue, rx) = unbounded::<LoadRequest>();
        let workers = options.workers.max(1);
        let policy = RetryPolicy {
            retries: options.retries,
            delay: options.retry_delay(),
        };

        for i in 0..workers {
            let rx = rx.clone();
            let fetcher = Arc::clone(&fetcher);
            thread::Builder::new()
                .name(format!("tile-loader-{i}"))
                .spawn(move || worker_loop(rx, fetcher, policy))?;
        }
        log::info!("tile loader started with {} workers", workers);

        Ok(Self { queue, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue one source of a tile. The returned receiver yields exactly one
    /// result, or disconnects if the loader is gone.
    pub fn submit(
        &self,
        coord: TileCoord,
        url: String,
        kind: SourceKind,
        tile_size: u32,
        cancel: Arc<AtomicBool>,
    ) -> Receiver<Result<SourceData>> {
        let (reply, receiver) = bounded(1);
        let request = LoadRequest {
            coord,
            url,
            kind,
            tile_size,
            cancel,
            reply,
        };
        if let Err(err) = self.queue.send(request) {
            log::warn!("tile loader queue closed, dropping {}", err.0.coord);
        }
        receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::AtomicUsize;

    fn png_bytes(color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(4, 4, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    fn recv(rx: &Receiver<Result<SourceData>>) -> Result<SourceData> {
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_loads_raster_in_background() {
        let bytes = png_bytes([10, 20, 30, 255]);
        let fetcher: Arc<dyn Fetch> = Arc::new(move |_: &str| -> Result<Vec<u8>> { Ok(bytes.clone()) });
        let loader = TileLoader::new(fetcher, &LoaderOptions::for_testing()).unwrap();

        let rx = loader.submit(
            TileCoord::new(0, 0, 0),
            "mem://0/0/0".into(),
            SourceKind::Raster,
            4,
            Arc::new(AtomicBool::new(false)),
        );
        match recv(&rx).unwrap() {
            SourceData::Raster(image) => assert_eq!(image.get_pixel(0, 0), &Rgba([10, 20, 30, 255])),
            other => panic!("expected raster, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let fetcher: Arc<dyn Fetch> = Arc::new(|_: &str| -> Result<Vec<u8>> { Ok(vec![1, 2, 3]) });
        let loader = TileLoader::new(fetcher, &LoaderOptions::for_testing()).unwrap();
        let rx = loader.submit(
            TileCoord::new(0, 0, 0),
            "mem://bad".into(),
            SourceKind::Raster,
            4,
            Arc::new(AtomicBool::new(false)),
        );
        assert!(matches!(recv(&rx), Err(MapError::Image(_))));
    }

    #[test]
    fn test_cancelled_request_is_skipped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetcher: Arc<dyn Fetch> = Arc::new(move |_: &str| -> Result<Vec<u8>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(png_bytes([0, 0, 0, 255]))
        });
        let loader = TileLoader::new(fetcher, &LoaderOptions::for_testing()).unwrap();

        let rx = loader.submit(
            TileCoord::new(0, 0, 0),
            "mem://cancelled".into(),
            SourceKind::Raster,
            4,
            Arc::new(AtomicBool::new(true)),
        );
        // The worker drops the reply sender without fetching
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_retries_server_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetcher: Arc<dyn Fetch> = Arc::new(move |url: &str| -> Result<Vec<u8>> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(MapError::Http {
                    status: 503,
                    url: url.to_string(),
                })
            } else {
                Ok(png_bytes([1, 1, 1, 255]))
            }
        });
        let options = LoaderOptions {
            retries: 2,
            ..LoaderOptions::for_testing()
        };
        let loader = TileLoader::new(fetcher, &options).unwrap();
        let rx = loader.submit(
            TileCoord::new(0, 0, 0),
            "mem://flaky".into(),
            SourceKind::Raster,
            4,
            Arc::new(AtomicBool::new(false)),
        );
        assert!(recv(&rx).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let err = MapError::Http {
            status: 404,
            url: "x".into(),
        };
        assert!(!is_retryable(&err));
        assert!(!is_retryable(&MapError::Decode("x".into())));
    }
}
