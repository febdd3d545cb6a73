mod helpers;
mod tests_codec;
mod tests_collision;
mod tests_compaction;
