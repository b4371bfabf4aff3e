//! Catalogue of the metric names a session is known to report.
//!
//! The catalogue seeds [`CollectedStats`](super::CollectedStats) so every known
//! metric has an `all` series from the first tick, fixes the CSV column set and
//! groups metrics into console tables. Unknown names are still accepted at
//! ingestion time; they simply get their series lazily.

use std::fmt;

pub const PAGE_METRICS: &[&str] = &[
    "cpu",
    "memory",
    "nodeCpu",
    "nodeMemory",
    "usedCpu",
    "usedMemory",
    "usedGpu",
    "pages",
    "peerConnections",
    "errors",
    "warnings",
    "httpRecvBytes",
    "httpRecvBitrate",
    "httpRecvLatency",
    "videoEndToEndDelay",
    "videoEndToEndNetworkDelay",
];

pub const INBOUND_AUDIO_METRICS: &[&str] = &[
    "audioRecvCodec",
    "audioRecvBytes",
    "audioRecvAvgJitterBufferDelay",
    "audioRecvBitrates",
    "audioRecvJitter",
    "audioRecvRoundTripTime",
    "audioRecvPacketsLost",
    "audioRecvNackCountSent",
    "audioRecvLevel",
];

pub const INBOUND_VIDEO_METRICS: &[&str] = &[
    "videoRecvCodec",
    "videoPliCountSent",
    "videoDecodeLatency",
    "videoRecvFps",
    "videoRecvAvgJitterBufferDelay",
    "videoRecvBitrates",
    "videoRecvBytes",
    "videoRecvHeight",
    "videoRecvJitter",
    "videoRecvRoundTripTime",
    "videoRecvPacketsLost",
    "videoRecvNackCountSent",
    "videoRecvWidth",
    "videoTotalFreezesDuration",
];

pub const INBOUND_SCREEN_METRICS: &[&str] = &[
    "screenRecvCodec",
    "screenPliCountSent",
    "screenDecodeLatency",
    "screenRecvFps",
    "screenRecvAvgJitterBufferDelay",
    "screenRecvBitrates",
    "screenRecvBytes",
    "screenRecvHeight",
    "screenRecvJitter",
    "screenRecvRoundTripTime",
    "screenRecvPacketsLost",
    "screenRecvNackCountSent",
    "screenRecvWidth",
    "screenTotalFreezesDuration",
];

pub const OUTBOUND_AUDIO_METRICS: &[&str] = &[
    "audioSentCodec",
    "audioSentBytes",
    "audioSentBitrates",
    "audioSentPacketsLost",
    "audioSentNackCountRecv",
    "audioSentRoundTripTime",
    "audioSentTransportRoundTripTime",
];

pub const OUTBOUND_VIDEO_METRICS: &[&str] = &[
    "videoSentCodec",
    "videoPliCountReceived",
    "videoEncodeLatency",
    "videoSentLatency",
    "videoQualityLimitationBandwidth",
    "videoQualityLimitationCpu",
    "videoQualityLimitationResolutionChanges",
    "videoSentActiveEncodings",
    "videoSentBitrates",
    "videoSentBytes",
    "videoSentFps",
    "videoSentWidth",
    "videoSentHeight",
    "videoSentMaxBitrate",
    "videoSentPacketsLost",
    "videoSentNackCountRecv",
    "videoSentRoundTripTime",
    "videoSentTransportRoundTripTime",
];

pub const OUTBOUND_SCREEN_METRICS: &[&str] = &[
    "screenSentCodec",
    "screenPliCountReceived",
    "screenEncodeLatency",
    "screenSentLatency",
    "screenQualityLimitationBandwidth",
    "screenQualityLimitationCpu",
    "screenQualityLimitationResolutionChanges",
    "screenSentActiveEncodings",
    "screenSentBitrates",
    "screenSentBytes",
    "screenSentFps",
    "screenSentWidth",
    "screenSentHeight",
    "screenSentMaxBitrate",
    "screenSentPacketsLost",
    "screenSentNackCountRecv",
    "screenSentRoundTripTime",
    "screenSentTransportRoundTripTime",
];

/// Console table a metric is printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricGroup {
    Page,
    InboundAudio,
    InboundVideo,
    InboundScreen,
    OutboundAudio,
    OutboundVideo,
    OutboundScreen,
    Custom,
}

impl MetricGroup {
    /// Groups in console print order.
    pub const ALL: [MetricGroup; 8] = [
        MetricGroup::Page,
        MetricGroup::InboundAudio,
        MetricGroup::InboundVideo,
        MetricGroup::InboundScreen,
        MetricGroup::OutboundAudio,
        MetricGroup::OutboundVideo,
        MetricGroup::OutboundScreen,
        MetricGroup::Custom,
    ];

    /// Built-in names of this group. Empty for [`MetricGroup::Custom`].
    #[must_use]
    pub const fn names(self) -> &'static [&'static str] {
        match self {
            MetricGroup::Page => PAGE_METRICS,
            MetricGroup::InboundAudio => INBOUND_AUDIO_METRICS,
            MetricGroup::InboundVideo => INBOUND_VIDEO_METRICS,
            MetricGroup::InboundScreen => INBOUND_SCREEN_METRICS,
            MetricGroup::OutboundAudio => OUTBOUND_AUDIO_METRICS,
            MetricGroup::OutboundVideo => OUTBOUND_VIDEO_METRICS,
            MetricGroup::OutboundScreen => OUTBOUND_SCREEN_METRICS,
            MetricGroup::Custom => &[],
        }
    }

    #[must_use]
    pub fn of(name: &str) -> MetricGroup {
        Self::ALL
            .into_iter()
            .find(|g| g.names().contains(&name))
            .unwrap_or(MetricGroup::Custom)
    }
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self {
            MetricGroup::Page => "Page",
            MetricGroup::InboundAudio => "Inbound audio",
            MetricGroup::InboundVideo => "Inbound video",
            MetricGroup::InboundScreen => "Inbound screen",
            MetricGroup::OutboundAudio => "Outbound audio",
            MetricGroup::OutboundVideo => "Outbound video",
            MetricGroup::OutboundScreen => "Outbound screen",
            MetricGroup::Custom => "Custom",
        };
        f.write_str(title)
    }
}

/// Every built-in name followed by `custom`, without duplicates, in catalogue order.
#[must_use]
pub fn known_metrics(custom: &[String]) -> Vec<String> {
    let mut names: Vec<String> = MetricGroup::ALL
        .into_iter()
        .flat_map(|g| g.names().iter().map(|n| (*n).to_string()))
        .collect();
    for name in custom {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}
