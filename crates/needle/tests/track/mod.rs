use std::num::NonZeroU32;

use needle::{NeedleError, TrackDownload};

use crate::{
    encrypt_segment, encrypted_playlist, fetcher,
    hls::{setup_mock_server, HlsMock},
    KEY,
};

#[tokio::test]
async fn downloads_track_to_output() -> anyhow::Result<()> {
    let (playlist_uri, server) =
        setup_mock_server(&encrypted_playlist(&["seg0.ts", "seg1.ts", "seg2.ts"])).await;
    server.mock_expect("/audio/key.bin", KEY.to_vec(), 1).await;
    for (i, part) in ["needle ", "drop ", "audio"].iter().enumerate() {
        server
            .mock(&format!("/audio/seg{i}.ts"), encrypt_segment(part.as_bytes()))
            .await;
    }

    let dir = tempfile::tempdir()?;
    let output = dir.path().join("tracks").join("track.ts");
    let result = TrackDownload::new(fetcher(), playlist_uri.parse()?, dir.path())
        .concurrency(NonZeroU32::new(2).unwrap())
        .output(Some(output.clone()))
        .run()
        .await?;

    assert_eq!(result, output);
    assert_eq!(std::fs::read_to_string(&output)?, "needle drop audio");
    // only the tracks directory is left, the intermediate file was moved
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);

    Ok(())
}

#[tokio::test]
async fn manual_key_skips_key_request() -> anyhow::Result<()> {
    let (playlist_uri, server) = setup_mock_server(&encrypted_playlist(&["seg0.ts"])).await;
    server.mock_expect("/audio/key.bin", KEY.to_vec(), 0).await;
    server
        .mock("/audio/seg0.ts", encrypt_segment(b"manual"))
        .await;

    let dir = tempfile::tempdir()?;
    let result = TrackDownload::new(fetcher(), playlist_uri.parse()?, dir.path())
        .manual_key(Some(hex::encode(KEY)))
        .run()
        .await?;

    assert_eq!(result.parent(), Some(dir.path()));
    assert_eq!(std::fs::read(result)?, b"manual");

    Ok(())
}

#[tokio::test]
async fn failed_download_leaves_no_file() -> anyhow::Result<()> {
    let (playlist_uri, server) =
        setup_mock_server(&encrypted_playlist(&["seg0.ts", "seg1.ts"])).await;
    server.mock("/audio/key.bin", KEY.to_vec()).await;
    server
        .mock("/audio/seg0.ts", encrypt_segment(b"first"))
        .await;
    server.mock_status("/audio/seg1.ts", 503).await;

    let dir = tempfile::tempdir()?;
    let result = TrackDownload::new(fetcher(), playlist_uri.parse()?, dir.path())
        .run()
        .await;

    assert!(matches!(result, Err(NeedleError::HttpError { .. })));
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);

    Ok(())
}

#[tokio::test]
async fn empty_playlist_gives_empty_track() -> anyhow::Result<()> {
    let data = "#EXTM3U
#EXT-X-TARGETDURATION:10
#EXT-X-ENDLIST";
    let (playlist_uri, _server) = setup_mock_server(data).await;

    let dir = tempfile::tempdir()?;
    let result = TrackDownload::new(fetcher(), playlist_uri.parse()?, dir.path())
        .run()
        .await?;

    assert_eq!(std::fs::metadata(result)?.len(), 0);

    Ok(())
}
