mod test_accumulator;
