mod assemble;
