#[macro_use]
extern crate log;

use getopts::Options;
use metricsd::{Configuration, Sink};
use std::{
    env,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

struct Generator {
    sink: Sink,
    sent: Arc<AtomicU64>,
    gauge: u64,
}

impl Generator {
    fn new(sink: Sink, sent: Arc<AtomicU64>) -> Generator { Generator { sink, sent, gauge: 0 } }

    fn run(&mut self) {
        let requests = self.sink.count("requests").expect("metric name is not empty");
        loop {
            self.gauge += 1;

            let mut timer = self.sink.time(Some("request_time"));
            requests.increment();
            self.sink.update_gauge("queue_depth", self.gauge % 100);
            self.sink.mark("visitors");
            timer.stop(None);

            self.sent.fetch_add(4, Ordering::Relaxed);
        }
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt("H", "host", "metricsd host", "HOST");
    opts.optopt("P", "port", "metricsd port", "INTEGER");
    opts.optopt("x", "prefix", "prefix for every metric name", "PREFIX");
    opts.optopt("p", "producers", "number of producers", "INTEGER");
    opts.optopt("c", "capacity", "maximum number of unprocessed lines", "INTEGER");
    opts.optopt("d", "duration", "seconds to run for", "INTEGER");
    opts.optflag("b", "batch", "batch lines into larger datagrams");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn parse_or<T: std::str::FromStr>(matches: &getopts::Matches, name: &str, default: T) -> Result<T, String> {
    match matches.opt_str(name) {
        Some(s) => s.parse().map_err(|_| format!("invalid value for --{}: {}", name, s)),
        None => Ok(default),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            error!("Failed to parse command line args: {}", f);
            return;
        },
    };

    if matches.opt_present("help") {
        print_usage(program, &opts);
        return;
    }

    info!("metricsd emitter");

    let parsed = parse_or(&matches, "port", 8125u16).and_then(|port| {
        let producers = parse_or(&matches, "producers", 1usize)?;
        let capacity = parse_or(&matches, "capacity", 1024usize)?;
        let duration = parse_or(&matches, "duration", 10u64)?;
        Ok((port, producers, capacity, duration))
    });
    let (port, producers, capacity, duration) = match parsed {
        Ok(values) => values,
        Err(e) => {
            error!("{}", e);
            return;
        },
    };
    let host = matches.opt_str("host").unwrap_or_else(|| "localhost".to_owned());
    let batch = matches.opt_present("batch");

    info!("target: {}:{}", host, port);
    info!("producers: {}", producers);
    info!("capacity: {}", capacity);
    info!("batch: {}", batch);

    let mut conf = Configuration::new().host(&host).port(port).capacity(capacity).batch(batch);
    if let Some(prefix) = matches.opt_str("prefix") {
        conf = conf.prefix(&prefix);
    }

    let (sink, controller) = match conf.spawn() {
        Ok(handles) => handles,
        Err(e) => {
            error!("failed to start dispatcher: {}", e);
            return;
        },
    };

    let sent = Arc::new(AtomicU64::new(0));
    for _ in 0..producers {
        let mut generator = Generator::new(sink.clone(), sent.clone());
        thread::spawn(move || generator.run());
    }

    // Poll the controller to figure out the send rate.
    let mut total = 0;
    let mut t0 = Instant::now();
    for _ in 0..duration {
        thread::sleep(Duration::from_secs(1));
        let t1 = Instant::now();

        let turn_total = sent.load(Ordering::Relaxed);
        let rate = (turn_total - total) as f64 / (t1 - t0).as_secs_f64();
        total = turn_total;
        t0 = t1;

        info!("rate: {:.0} lines per second", rate);
        match controller.status() {
            Ok(status) => info!(
                "socket open: {} buffered: {} lines / {} bytes",
                status.socket_open, status.buffered_lines, status.buffered_bytes
            ),
            Err(e) => warn!("failed to get dispatcher status: {}", e),
        }
    }

    controller.flush();
    info!("total lines emitted: {}", total);
}
