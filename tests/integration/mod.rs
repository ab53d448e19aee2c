mod helpers;

mod test_classify;
mod test_config;
mod test_publish;
mod test_release_flow;
