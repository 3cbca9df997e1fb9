#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate tracing;

mod app;
mod cli;
mod http;
mod metric;
#[cfg(test)]
mod test_support;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = app::run::run(std::env::args_os(), &mut std::io::stdout()).await;
    std::process::exit(code);
}
