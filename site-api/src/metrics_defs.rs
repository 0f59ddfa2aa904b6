use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "requests",
    metric_type: MetricType::Counter,
    description: "Number of requests handled. Tagged with route, status.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with route, status.",
};

pub const UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of calls to the stock backend, CMS and media host in seconds. Tagged with upstream.",
};

pub const PATHS_INVALIDATED: MetricDef = MetricDef {
    name: "revalidation.paths",
    metric_type: MetricType::Counter,
    description: "Number of pages invalidated by CMS change notifications",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUESTS,
    REQUEST_DURATION,
    UPSTREAM_DURATION,
    PATHS_INVALIDATED,
];
